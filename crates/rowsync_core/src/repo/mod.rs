//! Record store abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the managed-context contract used by the reconciliation core.
//! - Isolate SQLite details from pipeline and service orchestration.
//!
//! # Invariants
//! - Stores return semantic errors (`UnknownIdentity`, `ForeignContext`) in
//!   addition to DB transport errors.

pub mod record_store;
pub mod sqlite_store;
