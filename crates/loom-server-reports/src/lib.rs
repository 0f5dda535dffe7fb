// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deferred report jobs for Loom server.
//!
//! A schedule request takes a TTL-bounded lock and hands the run to an
//! executor. The executor caches the result, then releases the lock. Status
//! is resolved from which of the two entries exist, so it survives restarts
//! and is visible from any process sharing the store.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod job;
pub mod scheduler;
pub mod store;

pub use config::{load_config, load_config_with_file, ConfigError, ReportsConfig, StoreBackend};
pub use context::ExecutionContext;
pub use error::{JobError, StoreError};
pub use executor::{run_to_completion, ReportExecutor, RunOutcome, TokioExecutor};
pub use job::{DateRangeReportJob, ReportJob};
pub use scheduler::{ReportScheduler, DEFAULT_LOCK_TTL, DEFAULT_RESULT_TTL};
pub use store::{InMemoryReportStore, ReportStore, SqliteReportStore};

use std::sync::Arc;

/// Opens the store backend selected in `config`.
pub async fn open_store(config: &ReportsConfig) -> error::Result<Arc<dyn ReportStore>> {
	match config.store {
		StoreBackend::Memory => Ok(Arc::new(InMemoryReportStore::new())),
		StoreBackend::Sqlite => {
			let store = SqliteReportStore::connect(&config.database_url).await?;
			Ok(Arc::new(store))
		}
	}
}
