//! EDW access over ODBC.

pub mod connection_manager;
pub mod metadata_adapter;
pub mod odbc_session;
pub mod sql_utils;
