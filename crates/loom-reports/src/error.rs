// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors raised by the poller itself. Failures of the report service are
/// recorded in the poller state instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollerError {
	#[error("cannot {action} while {state}")]
	InvalidTransition {
		state: &'static str,
		action: &'static str,
	},
}
