// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

/// Where a poller is in the schedule/poll lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerState {
	Idle,
	/// A schedule request is in flight.
	Scheduling,
	/// Waiting for completion. `checks` counts status checks that saw the
	/// job still running.
	Polling { checks: u32 },
	Complete { payload: String },
	Error { message: String },
}

impl PollerState {
	pub fn name(&self) -> &'static str {
		match self {
			PollerState::Idle => "idle",
			PollerState::Scheduling => "scheduling",
			PollerState::Polling { .. } => "polling",
			PollerState::Complete { .. } => "complete",
			PollerState::Error { .. } => "error",
		}
	}

	/// No automatic polling happens from a terminal state.
	pub fn is_terminal(&self) -> bool {
		matches!(self, PollerState::Complete { .. } | PollerState::Error { .. })
	}
}

impl fmt::Display for PollerState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.name())
	}
}
