// Library for tests to access modules

pub mod commands;
pub mod config;
pub mod delta;
pub mod device;
pub mod error;
pub mod history_repo;
pub mod hub;
pub mod models;
pub mod parser;
pub mod projector;
pub mod remote_repo;
pub mod routes;
pub mod scheduler;
pub mod session;
pub mod sink;
pub mod worker;
