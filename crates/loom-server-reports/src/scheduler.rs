// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loom_reports_core::{
	JobKey, ReportStatus, ReportsApi, ReportsError, ResetResponse, Result, ScheduleResponse,
	StatusResponse,
};
use tracing::{debug, info, instrument};

use crate::context::ExecutionContext;
use crate::executor::ReportExecutor;
use crate::store::ReportStore;

/// Default lock lifetime. Bounds how long a crashed run blocks retries.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(60 * 60);
/// Default lifetime of a cached result.
pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Schedules report runs, resolves their status and resets them.
pub struct ReportScheduler {
	store: Arc<dyn ReportStore>,
	executor: Arc<dyn ReportExecutor>,
	lock_ttl: Duration,
}

impl ReportScheduler {
	pub fn new(store: Arc<dyn ReportStore>, executor: Arc<dyn ReportExecutor>) -> Self {
		Self {
			store,
			executor,
			lock_ttl: DEFAULT_LOCK_TTL,
		}
	}

	pub fn with_lock_ttl(mut self, lock_ttl: Duration) -> Self {
		self.lock_ttl = lock_ttl;
		self
	}

	pub fn lock_ttl(&self) -> Duration {
		self.lock_ttl
	}
}

#[async_trait]
impl ReportsApi for ReportScheduler {
	#[instrument(skip(self))]
	async fn schedule(&self, identifier: &str) -> Result<ScheduleResponse> {
		let ctx = ExecutionContext::new(JobKey::derive(identifier)?);

		// The lock carries the run id so only this run can release it.
		let acquired = self
			.store
			.set_if_absent_with_ttl(ctx.lock_key(), &ctx.run_id, self.lock_ttl)
			.await?;
		if !acquired {
			debug!(identifier = %ctx.key, "Report already running");
			return Err(ReportsError::AlreadyRunning(ctx.identifier().to_string()));
		}

		info!(identifier = %ctx.key, run_id = %ctx.run_id, "Report scheduled");
		self.executor.submit(ctx);

		Ok(ScheduleResponse::scheduled())
	}

	#[instrument(skip(self))]
	async fn check_status(&self, identifier: &str) -> Result<StatusResponse> {
		let key = JobKey::derive(identifier)?;

		let result = self.store.get(key.result_key()).await?;
		let has_lock = result.is_none() && self.store.exists(key.lock_key()).await?;

		Ok(
			match (ReportStatus::derive(result.is_some(), has_lock), result) {
				(ReportStatus::Complete, Some(payload)) => StatusResponse::complete(payload),
				(ReportStatus::Running, _) => StatusResponse::running(),
				_ => StatusResponse::pending(),
			},
		)
	}

	#[instrument(skip(self))]
	async fn reset(&self, identifier: &str) -> Result<ResetResponse> {
		let key = JobKey::derive(identifier)?;

		let result_removed = self.store.delete(key.result_key()).await?;
		let lock_removed = self.store.delete(key.lock_key()).await?;

		info!(
			identifier = %key,
			result_removed,
			lock_removed,
			"Report reset"
		);
		Ok(ResetResponse::cleared())
	}
}
