//! Role domain model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RoleId = Uuid;

/// Named role. Both `id` and `name` are unique lookup keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

impl Role {
    pub fn new(id: RoleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
