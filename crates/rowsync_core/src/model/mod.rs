//! Domain model for record identities and rendered snapshots.
//!
//! # Responsibility
//! - Define identity tokens (temporary vs permanent) and live record handles.
//! - Define the immutable, duplicate-free snapshot shared by observer,
//!   reconciler and projector.
//!
//! # Invariants
//! - Only the store mints or promotes identities.
//! - Snapshots are validated at construction time, never deduplicated later.

pub mod identity;
pub mod snapshot;
