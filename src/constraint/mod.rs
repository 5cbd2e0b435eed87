//! Path-based authorization rules

pub mod matcher;
pub mod resolver;

// Re-export main components
pub use matcher::{ConstraintOrder, ConstraintSet, LoginConstraint, PathMatch};
pub use resolver::{ConstraintResolver, ReloadStats, SkipReason};
