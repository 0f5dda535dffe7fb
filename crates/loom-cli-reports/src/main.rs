// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loom deferred report runner.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use loom_reports::{PollerState, ReportPoller};
use loom_reports_core::ReportsApi;
use loom_server_reports::config::LogFormat;
use loom_server_reports::{
	load_config, load_config_with_file, open_store, DateRangeReportJob, ReportScheduler,
	ReportsConfig, TokioExecutor,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Schedule, inspect and reset deferred date-range reports.
#[derive(Parser, Debug)]
#[command(name = "loom-reports", about = "Loom deferred report runner", version)]
struct Args {
	/// Config file to read instead of /etc/loom/reports.toml
	#[arg(long, short, env = "LOOM_REPORTS_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Schedule a report (unless one is cached or running) and wait for it
	Run {
		/// Date range the report covers, e.g. 2025-01-01_2025-01-31
		identifier: String,
	},
	/// Print the current status of a report as JSON
	Status { identifier: String },
	/// Clear the cached result and lock of a report
	Reset { identifier: String },
	/// Show version information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Command::Version = args.command {
		println!("loom-reports version: {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	let config = match &args.config {
		Some(path) => load_config_with_file(path)?,
		None => load_config()?,
	};
	init_tracing(&config);

	tracing::debug!(store = %config.store, "opening report store");
	let store = open_store(&config).await?;
	let executor = Arc::new(TokioExecutor::new(
		Arc::new(DateRangeReportJob::new(config.job_delay())),
		Arc::clone(&store),
		config.result_ttl(),
	));
	let scheduler = Arc::new(
		ReportScheduler::new(Arc::clone(&store), executor.clone()).with_lock_ttl(config.lock_ttl()),
	);

	match args.command {
		Command::Run { identifier } => {
			let poller = ReportPoller::new(scheduler, identifier)
				.with_interval(config.poll_interval());

			if poller.resume().await == PollerState::Idle {
				poller.start().await?;
			}

			let outcome = poller.wait_terminal().await;
			executor.shutdown().await;

			match outcome {
				PollerState::Complete { payload } => print!("{payload}"),
				PollerState::Error { message } => return Err(message.into()),
				other => return Err(format!("poller stopped in state {other}").into()),
			}
		}
		Command::Status { identifier } => {
			let status = scheduler.check_status(&identifier).await?;
			println!("{}", serde_json::to_string_pretty(&status)?);
		}
		Command::Reset { identifier } => {
			let reset = scheduler.reset(&identifier).await?;
			println!("{}", reset.message);
		}
		Command::Version => {}
	}

	Ok(())
}

/// Logs go to stderr so report payloads on stdout stay clean.
fn init_tracing(config: &ReportsConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.log_level.clone().into());

	let registry = tracing_subscriber::registry().with(filter);
	match config.log_format {
		LogFormat::Json => registry
			.with(
				tracing_subscriber::fmt::layer()
					.json()
					.with_writer(std::io::stderr),
			)
			.init(),
		LogFormat::Text => registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.init(),
	}
}
