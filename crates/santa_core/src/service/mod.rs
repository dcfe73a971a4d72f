//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository, assignment and dispatch calls into use cases.
//! - Keep callers decoupled from storage and gateway details.

pub mod draw_service;
