// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Loom deferred report jobs.
//!
//! A report is requested once, runs in the background under a TTL-bounded
//! lock, and its result is cached until it expires or is reset. Status is
//! never stored; it is derived from which of the two store entries exist.

pub mod api;
pub mod error;
pub mod identifier;
pub mod status;

pub use api::ReportsApi;
pub use error::{ReportsError, Result};
pub use identifier::{sanitize_identifier, JobKey, LOCK_KEY_PREFIX, RESULT_KEY_PREFIX};
pub use status::{
	ReportStatus, ResetResponse, ScheduleResponse, StatusResponse, RESET_MESSAGE, SCHEDULED_MESSAGE,
};
