// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the report store and report job bodies.

use loom_reports_core::ReportsError;
use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by a [`crate::store::ReportStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("internal error: {0}")]
	Internal(String),
}

impl From<StoreError> for ReportsError {
	fn from(err: StoreError) -> Self {
		ReportsError::StoreUnavailable(err.to_string())
	}
}

/// Failure of a report job body.
#[derive(Debug, Error)]
pub enum JobError {
	#[error("report generation failed: {0}")]
	Failed(String),
}
