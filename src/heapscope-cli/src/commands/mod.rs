//! Command handlers

pub mod block;
pub mod bounds;
pub mod configure;
pub mod graph;
pub mod target;
pub mod walk;
