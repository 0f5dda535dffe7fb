// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The client-facing operations of the report service.

use async_trait::async_trait;

use crate::error::Result;
use crate::status::{ResetResponse, ScheduleResponse, StatusResponse};

/// Operations a client can invoke against the report service.
///
/// Implemented in-process by the server scheduler and by any remote
/// transport. The poller only ever talks to this trait.
#[async_trait]
pub trait ReportsApi: Send + Sync {
	/// Locks the identifier and hands a run to the executor. Does not wait
	/// for the run to finish.
	async fn schedule(&self, identifier: &str) -> Result<ScheduleResponse>;

	/// Derives the current status from the store. Read-only.
	async fn check_status(&self, identifier: &str) -> Result<StatusResponse>;

	/// Clears both the cached result and the lock.
	async fn reset(&self, identifier: &str) -> Result<ResetResponse>;
}
