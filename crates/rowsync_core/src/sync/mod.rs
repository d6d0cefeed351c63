//! Identity reconciliation between the record store and the presentation.
//!
//! # Responsibility
//! - Observe store change batches and fetch live membership.
//! - Promote temporary identities before anything reaches the projector.
//! - Drive observe -> reconcile -> apply, one batch at a time.
//!
//! # Invariants
//! - The projector only ever sees snapshots without temporary identities.

pub mod observer;
pub mod pipeline;
pub mod reconciler;
