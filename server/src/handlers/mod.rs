//! Request handlers for collection operations.

mod collections;

pub use collections::*;
