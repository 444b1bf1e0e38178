pub mod keys;
pub mod missing;

// Re-export types for convenience.
pub use crate::types::keys::{Cell, LocationKey, RowKey, TimeStepKey};
pub use crate::types::missing::Missing;
