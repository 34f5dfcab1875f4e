//! Traits at the seams between the transfer engine and the outside world.

pub mod metadata_port;
pub mod record_port;
pub mod sql_port;
