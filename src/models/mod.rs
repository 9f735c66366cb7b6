// Domain models: parsed remote snapshots, capability values and device events

mod container;
mod event;
mod gpio;
mod identity;
mod login;
mod stats;

pub use container::{ActiveUser, ContainerRecord};
pub use event::{CapabilityValue, CapabilityWrite, DeviceEvent, EventEnvelope};
pub use gpio::{EXPOSED_PIN_COUNT, GpioPin, GpioState, MAX_PIN, Pull};
pub use identity::SystemIdentity;
pub use login::LoginRecord;
pub use stats::{InterfaceCounters, ProcessCounts, StatSnapshot};
