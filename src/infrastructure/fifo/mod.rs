//! Named-pipe plumbing.

pub mod pipe_bridge;
