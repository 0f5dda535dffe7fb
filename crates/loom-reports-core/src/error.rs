// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for deferred report jobs.

use thiserror::Error;

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportsError>;

/// Errors surfaced by the schedule, status and reset operations.
#[derive(Debug, Error)]
pub enum ReportsError {
	/// The identifier was empty once sanitized. Raised before any store access.
	#[error("Date range is missing.")]
	InvalidIdentifier,

	/// A run for this identifier is already in flight.
	#[error("This task is already running.")]
	AlreadyRunning(String),

	#[error("store unavailable: {0}")]
	StoreUnavailable(String),

	/// Transport failure between a client and the service.
	#[error("network failure: {0}")]
	NetworkFailure(String),
}
