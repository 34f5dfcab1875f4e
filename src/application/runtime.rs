// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Runtime Context
//!
//! Sets up the process-wide resources a job runs on:
//! 1. **Thread Pool**: the global `rayon` pool that runs one task per partition.
//! 2. **Connection Pool**: an `r2d2` pool of ODBC connections to the EDW.

use crate::config::AppConfig;
use crate::domain::errors::Result;
use crate::infrastructure::edw::metadata_adapter::EdwMetadataAdapter;
use crate::infrastructure::edw::odbc_session::OdbcSessionFactory;
use crate::ports::metadata_port::MetadataPort;
use crate::ports::sql_port::SessionFactory;
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// `RuntimeContext` holds shared resources that exist for the entire life of the app.
pub struct RuntimeContext {
    pub sessions: Arc<dyn SessionFactory>,
    pub metadata: Arc<dyn MetadataPort>,
    /// The number of partitions that can run at once.
    pub num_threads: usize,
}

/// Every running partition may hold a loader connection and a second one for
/// shadow-table DDL or catalog lookups, plus two spare.
pub fn pool_size_for(partitions: u32) -> u32 {
    partitions.saturating_mul(2).saturating_add(2)
}

impl RuntimeContext {
    /// Initializes the global thread pool and the EDW connection pool.
    pub fn init(config: &AppConfig) -> Result<Self> {
        let partitions = config.job.partitions();
        let num_threads = std::cmp::max(1, partitions as usize);
        info!("Initializing worker pool with {} threads", num_threads);

        // Rayon's global thread pool is used by `.into_par_iter()` in the orchestrator.
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .unwrap_or_else(|e| {
                info!("Global thread pool already initialized: {}", e);
            });

        let conn_str = config.database.get_connection_string();
        let pool_size = config
            .database
            .pool_size
            .unwrap_or_else(|| pool_size_for(partitions));
        let timeout = Duration::from_secs(config.database.connect_timeout_secs.unwrap_or(30));

        let sessions: Arc<dyn SessionFactory> = Arc::new(OdbcSessionFactory::connect(&conn_str, pool_size, timeout)?);
        let metadata: Arc<dyn MetadataPort> = Arc::new(EdwMetadataAdapter::new(Arc::clone(&sessions)));

        Ok(Self {
            sessions,
            metadata,
            num_threads,
        })
    }
}
