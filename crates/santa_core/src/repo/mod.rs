//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the narrow read/write contract the draw core needs.
//! - Isolate SQLite query details from draw orchestration.
//!
//! # Invariants
//! - `assigned_receiver_id` is written at most once per participant.
//! - `Drawn` is terminal; no repository call moves a group out of it.

pub mod draw_repo;
