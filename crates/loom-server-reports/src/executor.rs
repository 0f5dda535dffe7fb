// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Out-of-band execution of report jobs and their completion contract.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::context::ExecutionContext;
use crate::job::ReportJob;
use crate::store::ReportStore;

/// Runs a scheduled job outside the request path.
///
/// `submit` must return without waiting for the job. Nothing propagates back
/// to the caller once submitted.
pub trait ReportExecutor: Send + Sync {
	fn submit(&self, ctx: ExecutionContext);
}

/// How a single run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
	/// Result cached and lock cleared.
	Completed,
	/// Result cached but the lock could not be cleared; it expires by TTL.
	LockLeft,
	/// The result could not be written; the lock expires by TTL.
	ResultNotStored,
	/// The job body failed; the lock was cleared so the job can be retried.
	Failed,
}

/// Executes `job` for `ctx` and applies the completion contract:
/// write the result, then clear the lock.
/// Between the two writes both entries exist, never neither.
#[instrument(skip(job, store, ctx), fields(identifier = %ctx.identifier(), run_id = %ctx.run_id, job = job.name()))]
pub async fn run_to_completion(
	job: &dyn ReportJob,
	store: &dyn ReportStore,
	result_ttl: Duration,
	ctx: &ExecutionContext,
) -> RunOutcome {
	let started = Instant::now();

	let payload = match job.generate(ctx).await {
		Ok(payload) => payload,
		Err(e) => {
			warn!(error = %e, "Report job failed, releasing lock");
			if let Err(e) = release_lock(store, ctx).await {
				error!(error = %e, "Failed to release lock after job failure");
			}
			return RunOutcome::Failed;
		}
	};

	if let Err(e) = store
		.set_with_ttl(ctx.result_key(), &payload, result_ttl)
		.await
	{
		error!(error = %e, "Failed to store report result, lock left to expire");
		return RunOutcome::ResultNotStored;
	}

	if let Err(e) = release_lock(store, ctx).await {
		warn!(error = %e, "Failed to clear lock, it will expire by TTL");
		return RunOutcome::LockLeft;
	}

	info!(
		duration_ms = started.elapsed().as_millis() as u64,
		"Report job completed"
	);
	RunOutcome::Completed
}

/// Deletes the lock only while it still carries this run's id.
async fn release_lock(
	store: &dyn ReportStore,
	ctx: &ExecutionContext,
) -> crate::error::Result<()> {
	if !store.delete_if_value(ctx.lock_key(), &ctx.run_id).await? {
		debug!("Lock no longer held by this run, leaving it in place");
	}
	Ok(())
}

/// Executor that spawns each run as a tokio task.
pub struct TokioExecutor {
	job: Arc<dyn ReportJob>,
	store: Arc<dyn ReportStore>,
	result_ttl: Duration,
	tracker: TaskTracker,
}

impl TokioExecutor {
	pub fn new(job: Arc<dyn ReportJob>, store: Arc<dyn ReportStore>, result_ttl: Duration) -> Self {
		Self {
			job,
			store,
			result_ttl,
			tracker: TaskTracker::new(),
		}
	}

	/// Number of runs currently executing.
	pub fn in_flight(&self) -> usize {
		self.tracker.len()
	}

	/// Waits until every run submitted so far has finished.
	pub async fn wait_idle(&self) {
		self.tracker.close();
		self.tracker.wait().await;
		self.tracker.reopen();
	}

	/// Waits for in-flight runs. Runs are never interrupted.
	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let pending = self.in_flight();
		self.tracker.close();
		self.tracker.wait().await;
		info!(drained = pending, "Report executor shut down");
	}
}

impl ReportExecutor for TokioExecutor {
	fn submit(&self, ctx: ExecutionContext) {
		let job = Arc::clone(&self.job);
		let store = Arc::clone(&self.store);
		let result_ttl = self.result_ttl;

		self.tracker.spawn(async move {
			run_to_completion(job.as_ref(), store.as_ref(), result_ttl, &ctx).await;
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::{JobError, Result as StoreResult, StoreError};
	use crate::store::InMemoryReportStore;
	use async_trait::async_trait;
	use loom_reports_core::JobKey;
	use std::sync::Mutex;

	const HOUR: Duration = Duration::from_secs(3600);
	const DAY: Duration = Duration::from_secs(86_400);

	struct StaticJob;

	#[async_trait]
	impl ReportJob for StaticJob {
		fn name(&self) -> &str {
			"static"
		}

		async fn generate(&self, ctx: &ExecutionContext) -> std::result::Result<String, JobError> {
			Ok(format!("report:{}", ctx.identifier()))
		}
	}

	struct FailingJob;

	#[async_trait]
	impl ReportJob for FailingJob {
		fn name(&self) -> &str {
			"failing"
		}

		async fn generate(&self, _ctx: &ExecutionContext) -> std::result::Result<String, JobError> {
			Err(JobError::Failed("boom".to_string()))
		}
	}

	/// Records write order and can be told to fail writes.
	#[derive(Default)]
	struct RecordingStore {
		inner: InMemoryReportStore,
		ops: Mutex<Vec<String>>,
		fail_set: bool,
	}

	impl RecordingStore {
		fn ops(&self) -> Vec<String> {
			self.ops.lock().unwrap().clone()
		}
	}

	#[async_trait]
	impl ReportStore for RecordingStore {
		async fn get(&self, key: &str) -> StoreResult<Option<String>> {
			self.inner.get(key).await
		}

		async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
			self.ops.lock().unwrap().push(format!("set {key}"));
			if self.fail_set {
				return Err(StoreError::Internal("write refused".to_string()));
			}
			self.inner.set_with_ttl(key, value, ttl).await
		}

		async fn set_if_absent_with_ttl(
			&self,
			key: &str,
			value: &str,
			ttl: Duration,
		) -> StoreResult<bool> {
			self.inner.set_if_absent_with_ttl(key, value, ttl).await
		}

		async fn delete(&self, key: &str) -> StoreResult<bool> {
			self.ops.lock().unwrap().push(format!("delete {key}"));
			self.inner.delete(key).await
		}

		async fn delete_if_value(&self, key: &str, value: &str) -> StoreResult<bool> {
			self.ops.lock().unwrap().push(format!("delete {key}"));
			self.inner.delete_if_value(key, value).await
		}

		async fn purge_expired(&self) -> StoreResult<u64> {
			self.inner.purge_expired().await
		}
	}

	fn ctx(identifier: &str) -> ExecutionContext {
		ExecutionContext::new(JobKey::derive(identifier).unwrap())
	}

	#[tokio::test]
	async fn test_result_written_before_lock_cleared() {
		let store = RecordingStore::default();
		let ctx = ctx("q1");
		store
			.set_if_absent_with_ttl(ctx.lock_key(), &ctx.run_id, HOUR)
			.await
			.unwrap();

		let outcome = run_to_completion(&StaticJob, &store, DAY, &ctx).await;

		assert_eq!(outcome, RunOutcome::Completed);
		assert_eq!(store.ops(), vec!["set result:q1", "delete lock:q1"]);
		assert_eq!(
			store.get("result:q1").await.unwrap(),
			Some("report:q1".to_string())
		);
		assert!(!store.exists("lock:q1").await.unwrap());
	}

	#[tokio::test]
	async fn test_failed_job_releases_lock_without_result() {
		let store = RecordingStore::default();
		let ctx = ctx("q1");
		store
			.set_if_absent_with_ttl(ctx.lock_key(), &ctx.run_id, HOUR)
			.await
			.unwrap();

		let outcome = run_to_completion(&FailingJob, &store, DAY, &ctx).await;

		assert_eq!(outcome, RunOutcome::Failed);
		assert_eq!(store.ops(), vec!["delete lock:q1"]);
		assert!(!store.exists("lock:q1").await.unwrap());
		assert!(!store.exists("result:q1").await.unwrap());
	}

	#[tokio::test]
	async fn test_unstored_result_keeps_lock() {
		let store = RecordingStore {
			fail_set: true,
			..Default::default()
		};
		let ctx = ctx("q1");
		store
			.set_if_absent_with_ttl(ctx.lock_key(), &ctx.run_id, HOUR)
			.await
			.unwrap();

		let outcome = run_to_completion(&StaticJob, &store, DAY, &ctx).await;

		assert_eq!(outcome, RunOutcome::ResultNotStored);
		assert!(store.exists("lock:q1").await.unwrap());
	}

	#[tokio::test]
	async fn test_outlived_run_keeps_newer_lock() {
		let store = InMemoryReportStore::new();
		let stale = ctx("q1");
		let newer = ctx("q1");
		store
			.set_if_absent_with_ttl(newer.lock_key(), &newer.run_id, HOUR)
			.await
			.unwrap();

		let outcome = run_to_completion(&StaticJob, &store, DAY, &stale).await;

		assert_eq!(outcome, RunOutcome::Completed);
		assert_eq!(
			store.get("lock:q1").await.unwrap(),
			Some(newer.run_id.clone())
		);
		assert!(store.exists("result:q1").await.unwrap());
	}

	#[tokio::test]
	async fn test_failed_outlived_run_keeps_newer_lock() {
		let store = InMemoryReportStore::new();
		let stale = ctx("q1");
		let newer = ctx("q1");
		store
			.set_if_absent_with_ttl(newer.lock_key(), &newer.run_id, HOUR)
			.await
			.unwrap();

		let outcome = run_to_completion(&FailingJob, &store, DAY, &stale).await;

		assert_eq!(outcome, RunOutcome::Failed);
		assert!(store.exists("lock:q1").await.unwrap());
	}

	#[tokio::test]
	async fn test_tokio_executor_runs_submitted_job() {
		let store = Arc::new(InMemoryReportStore::new());
		let executor = TokioExecutor::new(Arc::new(StaticJob), store.clone(), DAY);

		executor.submit(ctx("q2"));
		executor.wait_idle().await;

		assert_eq!(executor.in_flight(), 0);
		assert_eq!(
			store.get("result:q2").await.unwrap(),
			Some("report:q2".to_string())
		);
	}

	#[tokio::test]
	async fn test_tokio_executor_accepts_work_after_wait_idle() {
		let store = Arc::new(InMemoryReportStore::new());
		let executor = TokioExecutor::new(Arc::new(StaticJob), store.clone(), DAY);

		executor.submit(ctx("a"));
		executor.wait_idle().await;
		executor.submit(ctx("b"));
		executor.shutdown().await;

		assert!(store.exists("result:a").await.unwrap());
		assert!(store.exists("result:b").await.unwrap());
	}
}
