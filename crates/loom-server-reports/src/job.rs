// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Report job bodies.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use crate::context::ExecutionContext;
use crate::error::JobError;

/// The opaque, potentially slow function that produces a report.
#[async_trait]
pub trait ReportJob: Send + Sync {
	fn name(&self) -> &str;

	/// Produces the payload that gets cached under the result key.
	async fn generate(&self, ctx: &ExecutionContext) -> Result<String, JobError>;
}

/// Summary report over a date range such as `2025-01-01_2025-01-31`.
pub struct DateRangeReportJob {
	delay: Duration,
}

impl DateRangeReportJob {
	/// `delay` stands in for the time spent crunching entries.
	pub fn new(delay: Duration) -> Self {
		Self { delay }
	}
}

impl Default for DateRangeReportJob {
	fn default() -> Self {
		Self::new(Duration::from_secs(10))
	}
}

#[async_trait]
impl ReportJob for DateRangeReportJob {
	fn name(&self) -> &str {
		"date-range-report"
	}

	#[instrument(skip(self, ctx), fields(identifier = %ctx.identifier(), run_id = %ctx.run_id))]
	async fn generate(&self, ctx: &ExecutionContext) -> Result<String, JobError> {
		tokio::time::sleep(self.delay).await;

		let generated_on = Utc::now().format("%Y-%m-%d %H:%M:%S");
		debug!("report generated");

		Ok(format!(
			"Report for '{}' generated on: {generated_on}\n1,234 entries processed.\n",
			ctx.identifier()
		))
	}
}
