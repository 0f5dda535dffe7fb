// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client-side polling for Loom deferred report jobs.
//!
//! A [`ReportPoller`] schedules a report, then checks its status on a fixed
//! interval until it completes or fails. State is always re-derived from the
//! service, so a new poller for a running report picks up where an old one
//! left off.

pub mod error;
pub mod poller;
pub mod state;

pub use error::PollerError;
pub use poller::{ReportPoller, DEFAULT_POLL_INTERVAL};
pub use state::PollerState;
