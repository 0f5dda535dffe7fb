// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Status and acknowledgement types returned to clients.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Acknowledgement returned once a run has been handed to the executor.
pub const SCHEDULED_MESSAGE: &str = "Task has been scheduled! It is now running in the background.";
/// Acknowledgement returned after the cached result and lock were cleared.
pub const RESET_MESSAGE: &str = "Task cache has been cleared.";

/// Status of a report job, derived from which store entries exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
	/// Neither a result nor a lock exists.
	Pending,
	/// A lock exists and no result has been written yet.
	Running,
	/// A cached result exists. Wins over any lock.
	Complete,
}

impl ReportStatus {
	/// Derives status from entry presence. A result always wins over a lock.
	pub fn derive(has_result: bool, has_lock: bool) -> Self {
		match (has_result, has_lock) {
			(true, _) => ReportStatus::Complete,
			(false, true) => ReportStatus::Running,
			(false, false) => ReportStatus::Pending,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ReportStatus::Pending => "pending",
			ReportStatus::Running => "running",
			ReportStatus::Complete => "complete",
		}
	}
}

impl fmt::Display for ReportStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for ReportStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(ReportStatus::Pending),
			"running" => Ok(ReportStatus::Running),
			"complete" => Ok(ReportStatus::Complete),
			_ => Err(format!("unknown report status: {s}")),
		}
	}
}

/// Response of a status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
	pub status: ReportStatus,
	/// The cached report, present only when `status` is `complete`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payload: Option<String>,
}

impl StatusResponse {
	pub fn pending() -> Self {
		Self {
			status: ReportStatus::Pending,
			payload: None,
		}
	}

	pub fn running() -> Self {
		Self {
			status: ReportStatus::Running,
			payload: None,
		}
	}

	pub fn complete(payload: impl Into<String>) -> Self {
		Self {
			status: ReportStatus::Complete,
			payload: Some(payload.into()),
		}
	}
}

/// Response of a schedule request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResponse {
	pub ok: bool,
	pub message: String,
}

impl ScheduleResponse {
	pub fn scheduled() -> Self {
		Self {
			ok: true,
			message: SCHEDULED_MESSAGE.to_string(),
		}
	}
}

/// Response of a reset request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetResponse {
	pub ok: bool,
	pub message: String,
}

impl ResetResponse {
	pub fn cleared() -> Self {
		Self {
			ok: true,
			message: RESET_MESSAGE.to_string(),
		}
	}
}
