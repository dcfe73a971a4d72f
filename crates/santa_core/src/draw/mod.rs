//! Pure draw algorithms. No I/O.

pub mod assignment;
