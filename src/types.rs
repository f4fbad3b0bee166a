/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Document operations supported throughout the system
/// Used by both the observer pipeline and individual records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Select,
}
