//! Outbound notification plumbing.
//!
//! # Responsibility
//! - Define the messaging gateway contract consumed by the core.
//! - Send message batches sequentially behind a rate limiter.
//! - Render the participant and organizer message texts.
//!
//! # Invariants
//! - Delivery failures are returned as data, never raised.
//! - No retries happen inside this module.

pub mod dispatcher;
pub mod evolution;
pub mod gateway;
pub mod messages;
pub mod rate_limit;
