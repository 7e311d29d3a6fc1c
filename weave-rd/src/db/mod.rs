//! Database operations for weave-rd

pub mod connections;
