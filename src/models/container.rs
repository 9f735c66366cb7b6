// Docker container and active-user table rows

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header of the container id column in `docker ps -a`.
pub const CONTAINER_ID_COLUMN: &str = "CONTAINER ID";
/// Header of the container name column in `docker ps -a`.
pub const CONTAINER_NAMES_COLUMN: &str = "NAMES";

/// One row of `docker ps -a`, column header to cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerRecord {
    pub columns: BTreeMap<String, String>,
}

impl ContainerRecord {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.get(CONTAINER_ID_COLUMN)
    }

    pub fn name(&self) -> Option<&str> {
        self.get(CONTAINER_NAMES_COLUMN)
    }

    /// Case-insensitive substring match on name, or substring match on id.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        let name_found = self
            .name()
            .is_some_and(|n| n.to_lowercase().contains(&query));
        let id_found = self.id().is_some_and(|id| id.contains(&query));
        name_found || id_found
    }
}

/// One row of `w`, column header (without the `@`) to cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActiveUser {
    pub columns: BTreeMap<String, String>,
}

impl ActiveUser {
    pub fn user(&self) -> Option<&str> {
        self.columns.get("USER").map(String::as_str)
    }
}
