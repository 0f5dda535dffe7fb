// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use loom_reports_core::{ReportStatus, ReportsApi};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::PollerError;
use crate::state::PollerState;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Handle to the repeating status check owned by one poller.
struct PollTimer {
	token: CancellationToken,
	handle: JoinHandle<()>,
}

impl PollTimer {
	fn cancel(self) {
		self.token.cancel();
		drop(self.handle);
	}
}

/// Drives schedule and status calls for one identifier.
///
/// ```ignore
/// let poller = ReportPoller::new(api, "2025-01-01_2025-01-31");
/// poller.resume().await;
/// if poller.state() == PollerState::Idle {
///     poller.start().await?;
/// }
/// match poller.wait_terminal().await {
///     PollerState::Complete { payload } => println!("{payload}"),
///     PollerState::Error { message } => eprintln!("{message}"),
///     _ => unreachable!(),
/// }
/// ```
pub struct ReportPoller {
	api: Arc<dyn ReportsApi>,
	identifier: String,
	interval: Duration,
	state: Arc<watch::Sender<PollerState>>,
	timer: Mutex<Option<PollTimer>>,
}

impl ReportPoller {
	pub fn new(api: Arc<dyn ReportsApi>, identifier: impl Into<String>) -> Self {
		let (state, _) = watch::channel(PollerState::Idle);
		Self {
			api,
			identifier: identifier.into(),
			interval: DEFAULT_POLL_INTERVAL,
			state: Arc::new(state),
			timer: Mutex::new(None),
		}
	}

	pub fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	pub fn identifier(&self) -> &str {
		&self.identifier
	}

	pub fn state(&self) -> PollerState {
		self.state.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<PollerState> {
		self.state.subscribe()
	}

	/// Whether a status timer is currently active.
	pub fn is_polling(&self) -> bool {
		self.lock_timer()
			.as_ref()
			.is_some_and(|t| !t.token.is_cancelled())
	}

	/// Derives state from the service, as on a fresh page load.
	///
	/// A running report re-enters polling; a complete one lands in
	/// `Complete`; a pending one leaves the poller `Idle`.
	#[instrument(skip(self), fields(identifier = %self.identifier))]
	pub async fn resume(&self) -> PollerState {
		self.stop_timer();

		match self.api.check_status(&self.identifier).await {
			Ok(response) => match response.status {
				ReportStatus::Complete => {
					self.state.send_replace(PollerState::Complete {
						payload: response.payload.unwrap_or_default(),
					});
				}
				ReportStatus::Running => {
					info!("Task is already running. Checking for completion...");
					self.start_polling();
				}
				ReportStatus::Pending => {
					self.state.send_replace(PollerState::Idle);
				}
			},
			Err(e) => {
				warn!(error = %e, "Status check failed on load");
				self.state.send_replace(PollerState::Error {
					message: format!("Error checking task status: {e}"),
				});
			}
		}

		self.state()
	}

	/// Schedules the report and, on success, starts polling.
	///
	/// Allowed from `Idle`, and from `Error` as a manual retry.
	#[instrument(skip(self), fields(identifier = %self.identifier))]
	pub async fn start(&self) -> Result<PollerState, PollerError> {
		let mut from = "idle";
		let allowed = self.state.send_if_modified(|state| match state {
			PollerState::Idle | PollerState::Error { .. } => {
				*state = PollerState::Scheduling;
				true
			}
			other => {
				from = other.name();
				false
			}
		});
		if !allowed {
			return Err(PollerError::InvalidTransition {
				state: from,
				action: "schedule",
			});
		}

		match self.api.schedule(&self.identifier).await {
			Ok(response) => {
				info!(message = %response.message, "Report scheduled");
				self.start_polling();
			}
			Err(e) => {
				warn!(error = %e, "Schedule request failed");
				self.state.send_replace(PollerState::Error {
					message: format!("Error: {e}"),
				});
			}
		}

		Ok(self.state())
	}

	/// Clears the cached report and re-derives state from scratch.
	///
	/// Only allowed once the report is `Complete`.
	#[instrument(skip(self), fields(identifier = %self.identifier))]
	pub async fn reset(&self) -> Result<PollerState, PollerError> {
		let state = self.state();
		if !matches!(state, PollerState::Complete { .. }) {
			return Err(PollerError::InvalidTransition {
				state: state.name(),
				action: "reset",
			});
		}

		self.stop_timer();

		match self.api.reset(&self.identifier).await {
			Ok(response) => {
				info!(message = %response.message, "Report reset");
				Ok(self.resume().await)
			}
			Err(e) => {
				warn!(error = %e, "Reset request failed");
				self.state.send_replace(PollerState::Error {
					message: format!("Error: Could not reset task. {e}"),
				});
				Ok(self.state())
			}
		}
	}

	/// Stops polling without changing state, as when navigating away.
	pub fn cancel(&self) {
		self.stop_timer();
	}

	/// Waits until the poller reaches `Complete` or `Error`.
	///
	/// Never returns for an idle poller that nobody starts.
	pub async fn wait_terminal(&self) -> PollerState {
		let mut rx = self.state.subscribe();
		let result = rx.wait_for(PollerState::is_terminal).await.map(|s| s.clone());
		match result {
			Ok(state) => state,
			Err(_) => self.state(),
		}
	}

	fn start_polling(&self) {
		let token = CancellationToken::new();
		self.state.send_replace(PollerState::Polling { checks: 0 });

		let handle = tokio::spawn(poll_loop(
			Arc::clone(&self.api),
			self.identifier.clone(),
			self.interval,
			Arc::clone(&self.state),
			token.clone(),
		));

		let previous = self.lock_timer().replace(PollTimer { token, handle });
		if let Some(previous) = previous {
			previous.cancel();
		}
	}

	fn stop_timer(&self) {
		if let Some(timer) = self.lock_timer().take() {
			timer.cancel();
		}
	}

	fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<PollTimer>> {
		self.timer.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

impl Drop for ReportPoller {
	fn drop(&mut self) {
		self.stop_timer();
	}
}

async fn poll_loop(
	api: Arc<dyn ReportsApi>,
	identifier: String,
	interval: Duration,
	state: Arc<watch::Sender<PollerState>>,
	token: CancellationToken,
) {
	// The first tick completes immediately.
	let mut ticker = tokio::time::interval(interval);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
	let mut checks = 0u32;

	loop {
		tokio::select! {
			biased;
			_ = token.cancelled() => break,
			_ = ticker.tick() => {}
		}

		let result = tokio::select! {
			biased;
			_ = token.cancelled() => break,
			result = api.check_status(&identifier) => result,
		};

		// A cancel that raced the check owns the state now.
		if token.is_cancelled() {
			break;
		}

		match result {
			Ok(response) => match response.status {
				ReportStatus::Complete => {
					debug!(identifier = %identifier, "Task is complete");
					state.send_replace(PollerState::Complete {
						payload: response.payload.unwrap_or_default(),
					});
					token.cancel();
					break;
				}
				ReportStatus::Running => {
					checks += 1;
					debug!(identifier = %identifier, checks, "Task is still running");
					state.send_replace(PollerState::Polling { checks });
				}
				ReportStatus::Pending => {
					debug!(identifier = %identifier, "Task status: pending");
				}
			},
			Err(e) => {
				warn!(identifier = %identifier, error = %e, "Polling check failed");
				state.send_replace(PollerState::Error {
					message: format!("Error checking task status: {e}"),
				});
				token.cancel();
				break;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use loom_reports_core::{
		ReportsError, ResetResponse, Result as ApiResult, ScheduleResponse, StatusResponse,
	};
	use std::collections::VecDeque;
	use std::sync::atomic::{AtomicUsize, Ordering};

	/// Replays scripted status responses. The last one repeats.
	struct ScriptedApi {
		statuses: Mutex<VecDeque<ApiResult<StatusResponse>>>,
		schedule_fails: bool,
		reset_fails: bool,
		status_calls: AtomicUsize,
		reset_calls: AtomicUsize,
	}

	impl ScriptedApi {
		fn new(statuses: Vec<ApiResult<StatusResponse>>) -> Self {
			Self {
				statuses: Mutex::new(statuses.into()),
				schedule_fails: false,
				reset_fails: false,
				status_calls: AtomicUsize::new(0),
				reset_calls: AtomicUsize::new(0),
			}
		}

		fn status_calls(&self) -> usize {
			self.status_calls.load(Ordering::SeqCst)
		}
	}

	fn clone_result(result: &ApiResult<StatusResponse>) -> ApiResult<StatusResponse> {
		match result {
			Ok(r) => Ok(r.clone()),
			Err(e) => Err(ReportsError::NetworkFailure(e.to_string())),
		}
	}

	#[async_trait]
	impl ReportsApi for ScriptedApi {
		async fn schedule(&self, _identifier: &str) -> ApiResult<ScheduleResponse> {
			if self.schedule_fails {
				return Err(ReportsError::AlreadyRunning("q1".to_string()));
			}
			Ok(ScheduleResponse::scheduled())
		}

		async fn check_status(&self, _identifier: &str) -> ApiResult<StatusResponse> {
			self.status_calls.fetch_add(1, Ordering::SeqCst);
			let mut statuses = self.statuses.lock().unwrap();
			if statuses.len() > 1 {
				statuses.pop_front().unwrap()
			} else {
				clone_result(statuses.front().unwrap())
			}
		}

		async fn reset(&self, _identifier: &str) -> ApiResult<ResetResponse> {
			self.reset_calls.fetch_add(1, Ordering::SeqCst);
			if self.reset_fails {
				return Err(ReportsError::StoreUnavailable("database is locked".to_string()));
			}
			let mut statuses = self.statuses.lock().unwrap();
			statuses.clear();
			statuses.push_back(Ok(StatusResponse::pending()));
			Ok(ResetResponse::cleared())
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_polls_until_complete() {
		let api = Arc::new(ScriptedApi::new(vec![
			Ok(StatusResponse::running()),
			Ok(StatusResponse::running()),
			Ok(StatusResponse::complete("report")),
		]));
		let poller = ReportPoller::new(api.clone(), "q1");
		let started = tokio::time::Instant::now();

		let state = poller.start().await.unwrap();
		assert_eq!(state, PollerState::Polling { checks: 0 });

		let state = poller.wait_terminal().await;
		assert_eq!(
			state,
			PollerState::Complete {
				payload: "report".to_string()
			}
		);
		assert_eq!(api.status_calls(), 3);
		// immediate first check, then two intervals
		assert_eq!(started.elapsed(), DEFAULT_POLL_INTERVAL * 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_running_updates_indicator() {
		let api = Arc::new(ScriptedApi::new(vec![Ok(StatusResponse::running())]));
		let poller = ReportPoller::new(api, "q1");
		let mut rx = poller.subscribe();

		poller.start().await.unwrap();
		rx.wait_for(|s| matches!(s, PollerState::Polling { checks } if *checks >= 2))
			.await
			.unwrap();
		assert!(poller.is_polling());
	}

	#[tokio::test(start_paused = true)]
	async fn test_pending_while_polling_keeps_polling() {
		let api = Arc::new(ScriptedApi::new(vec![
			Ok(StatusResponse::pending()),
			Ok(StatusResponse::complete("done")),
		]));
		let poller = ReportPoller::new(api.clone(), "q1");

		poller.start().await.unwrap();
		let state = poller.wait_terminal().await;

		assert!(matches!(state, PollerState::Complete { .. }));
		assert_eq!(api.status_calls(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_status_error_stops_polling() {
		let api = Arc::new(ScriptedApi::new(vec![
			Ok(StatusResponse::running()),
			Err(ReportsError::NetworkFailure("connection reset".to_string())),
		]));
		let poller = ReportPoller::new(api.clone(), "q1");

		poller.start().await.unwrap();
		let state = poller.wait_terminal().await;

		match state {
			PollerState::Error { message } => {
				assert!(message.starts_with("Error checking task status"));
				assert!(message.contains("connection reset"));
			}
			other => panic!("Expected Error state, got: {other:?}"),
		}
		assert!(!poller.is_polling());

		// no further checks once terminal
		let calls = api.status_calls();
		tokio::time::sleep(DEFAULT_POLL_INTERVAL * 3).await;
		assert_eq!(api.status_calls(), calls);
	}

	#[tokio::test]
	async fn test_schedule_failure_is_terminal_error() {
		let api = Arc::new(ScriptedApi {
			schedule_fails: true,
			..ScriptedApi::new(vec![Ok(StatusResponse::running())])
		});
		let poller = ReportPoller::new(api.clone(), "q1");

		let state = poller.start().await.unwrap();

		assert_eq!(
			state,
			PollerState::Error {
				message: "Error: This task is already running.".to_string()
			}
		);
		assert_eq!(api.status_calls(), 0);
		assert!(!poller.is_polling());
	}

	#[tokio::test(start_paused = true)]
	async fn test_start_rejected_while_polling() {
		let api = Arc::new(ScriptedApi::new(vec![Ok(StatusResponse::running())]));
		let poller = ReportPoller::new(api, "q1");

		poller.start().await.unwrap();
		let err = poller.start().await.unwrap_err();

		assert_eq!(
			err,
			PollerError::InvalidTransition {
				state: "polling",
				action: "schedule"
			}
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_resume_running_enters_polling() {
		let api = Arc::new(ScriptedApi::new(vec![
			Ok(StatusResponse::running()),
			Ok(StatusResponse::running()),
			Ok(StatusResponse::complete("late")),
		]));
		let poller = ReportPoller::new(api, "q1");

		let state = poller.resume().await;
		assert_eq!(state, PollerState::Polling { checks: 0 });

		let state = poller.wait_terminal().await;
		assert_eq!(
			state,
			PollerState::Complete {
				payload: "late".to_string()
			}
		);
	}

	#[tokio::test]
	async fn test_resume_pending_and_complete() {
		let api = Arc::new(ScriptedApi::new(vec![Ok(StatusResponse::pending())]));
		let poller = ReportPoller::new(api, "q1");
		assert_eq!(poller.resume().await, PollerState::Idle);
		assert!(!poller.is_polling());

		let api = Arc::new(ScriptedApi::new(vec![Ok(StatusResponse::complete("x"))]));
		let poller = ReportPoller::new(api, "q1");
		assert_eq!(
			poller.resume().await,
			PollerState::Complete {
				payload: "x".to_string()
			}
		);
	}

	#[tokio::test]
	async fn test_reset_only_from_complete() {
		let api = Arc::new(ScriptedApi::new(vec![Ok(StatusResponse::pending())]));
		let poller = ReportPoller::new(api.clone(), "q1");

		let err = poller.reset().await.unwrap_err();
		assert_eq!(
			err,
			PollerError::InvalidTransition {
				state: "idle",
				action: "reset"
			}
		);
		assert_eq!(api.reset_calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_reset_reloads_to_idle() {
		let api = Arc::new(ScriptedApi::new(vec![Ok(StatusResponse::complete("x"))]));
		let poller = ReportPoller::new(api.clone(), "q1");
		poller.resume().await;

		let state = poller.reset().await.unwrap();

		assert_eq!(state, PollerState::Idle);
		assert_eq!(api.reset_calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_cancel_stops_timer() {
		let api = Arc::new(ScriptedApi::new(vec![Ok(StatusResponse::running())]));
		let poller = ReportPoller::new(api.clone(), "q1");

		poller.start().await.unwrap();
		let mut rx = poller.subscribe();
		rx.wait_for(|s| matches!(s, PollerState::Polling { checks } if *checks >= 1))
			.await
			.unwrap();

		poller.cancel();
		assert!(!poller.is_polling());

		let calls = api.status_calls();
		tokio::time::sleep(DEFAULT_POLL_INTERVAL * 4).await;
		assert_eq!(api.status_calls(), calls);
	}

	#[tokio::test(start_paused = true)]
	async fn test_custom_interval() {
		let api = Arc::new(ScriptedApi::new(vec![
			Ok(StatusResponse::running()),
			Ok(StatusResponse::complete("x")),
		]));
		let poller = ReportPoller::new(api, "q1").with_interval(Duration::from_secs(1));
		let started = tokio::time::Instant::now();

		poller.start().await.unwrap();
		poller.wait_terminal().await;

		assert_eq!(started.elapsed(), Duration::from_secs(1));
	}

	#[tokio::test]
	async fn test_reset_failure_is_error() {
		let api = Arc::new(ScriptedApi {
			reset_fails: true,
			..ScriptedApi::new(vec![Ok(StatusResponse::complete("x"))])
		});
		let poller = ReportPoller::new(api.clone(), "q1");
		poller.resume().await;

		let state = poller.reset().await.unwrap();

		assert_eq!(
			state,
			PollerState::Error {
				message: "Error: Could not reset task. store unavailable: database is locked"
					.to_string()
			}
		);
		assert_eq!(api.reset_calls.load(Ordering::SeqCst), 1);
		assert!(!poller.is_polling());
	}

	#[tokio::test(start_paused = true)]
	async fn test_drop_stops_timer() {
		let api = Arc::new(ScriptedApi::new(vec![Ok(StatusResponse::running())]));
		let poller = ReportPoller::new(api.clone(), "q1");
		let mut rx = poller.subscribe();

		poller.start().await.unwrap();
		rx.wait_for(|s| matches!(s, PollerState::Polling { checks } if *checks >= 1))
			.await
			.unwrap();
		drop(poller);

		let calls = api.status_calls();
		tokio::time::sleep(DEFAULT_POLL_INTERVAL * 4).await;
		assert_eq!(api.status_calls(), calls);
	}

	#[tokio::test(start_paused = true)]
	async fn test_repolling_keeps_single_timer() {
		let api = Arc::new(ScriptedApi::new(vec![Ok(StatusResponse::running())]));
		let poller = ReportPoller::new(api.clone(), "q1");

		assert_eq!(poller.resume().await, PollerState::Polling { checks: 0 });
		assert_eq!(poller.resume().await, PollerState::Polling { checks: 0 });
		assert_eq!(api.status_calls(), 2);

		// one timer: immediate check, then at 5s and 10s
		tokio::time::sleep(DEFAULT_POLL_INTERVAL * 2 + Duration::from_secs(1)).await;
		assert_eq!(api.status_calls(), 5);
		assert!(poller.is_polling());
	}
}
