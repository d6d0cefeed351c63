//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store mutations and pipeline passes into use-case APIs.
//! - Keep presentation hosts decoupled from storage details.

pub mod record_service;
