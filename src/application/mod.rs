//! Application layer: loader threads, worker loops and job orchestration.

pub mod loader_thread;
pub mod orchestrator;
pub mod partition_assigner;
pub mod runtime;
pub mod temp_tables;
pub mod transfer_loop;
