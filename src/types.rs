/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Item operations subject to an authorization decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn is_mutation(&self) -> bool {
        matches!(self, Operation::Update | Operation::Delete)
    }
}
