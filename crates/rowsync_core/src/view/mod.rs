//! Presentation-side state: snapshot diffing and rendered rows.
//!
//! # Responsibility
//! - Compute identity-keyed transitions between applied snapshots.
//! - Own the rendered rows, independent of any UI toolkit.

pub mod diff;
pub mod projector;
