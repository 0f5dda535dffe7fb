// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for report jobs.
//!
//! Precedence (highest to lowest):
//! 1. Environment variables (`LOOM_REPORTS_*`)
//! 2. Config file (`/etc/loom/reports.toml` or an explicit path)
//! 3. Built-in defaults

mod sources;

pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("validation error: {0}")]
	Validation(String),
}

/// Which store backend holds lock and result entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
	#[default]
	Memory,
	Sqlite,
}

impl FromStr for StoreBackend {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"memory" => Ok(StoreBackend::Memory),
			"sqlite" => Ok(StoreBackend::Sqlite),
			_ => Err(format!("unknown store backend: {s}")),
		}
	}
}

impl fmt::Display for StoreBackend {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StoreBackend::Memory => write!(f, "memory"),
			StoreBackend::Sqlite => write!(f, "sqlite"),
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
	#[default]
	Text,
	Json,
}

impl FromStr for LogFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"text" => Ok(LogFormat::Text),
			"json" => Ok(LogFormat::Json),
			_ => Err(format!("unknown log format: {s}")),
		}
	}
}

/// Partial configuration as read from a single source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportsConfigLayer {
	pub lock_ttl_secs: Option<u64>,
	pub result_ttl_secs: Option<u64>,
	pub poll_interval_secs: Option<u64>,
	pub job_delay_secs: Option<u64>,
	pub store: Option<StoreBackend>,
	pub database_url: Option<String>,
	pub log_level: Option<String>,
	pub log_format: Option<LogFormat>,
}

impl ReportsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.lock_ttl_secs.is_some() {
			self.lock_ttl_secs = other.lock_ttl_secs;
		}
		if other.result_ttl_secs.is_some() {
			self.result_ttl_secs = other.result_ttl_secs;
		}
		if other.poll_interval_secs.is_some() {
			self.poll_interval_secs = other.poll_interval_secs;
		}
		if other.job_delay_secs.is_some() {
			self.job_delay_secs = other.job_delay_secs;
		}
		if other.store.is_some() {
			self.store = other.store;
		}
		if other.database_url.is_some() {
			self.database_url = other.database_url;
		}
		if other.log_level.is_some() {
			self.log_level = other.log_level;
		}
		if other.log_format.is_some() {
			self.log_format = other.log_format;
		}
	}

	pub fn finalize(self) -> ReportsConfig {
		let defaults = ReportsConfig::default();
		ReportsConfig {
			lock_ttl_secs: self.lock_ttl_secs.unwrap_or(defaults.lock_ttl_secs),
			result_ttl_secs: self.result_ttl_secs.unwrap_or(defaults.result_ttl_secs),
			poll_interval_secs: self.poll_interval_secs.unwrap_or(defaults.poll_interval_secs),
			job_delay_secs: self.job_delay_secs.unwrap_or(defaults.job_delay_secs),
			store: self.store.unwrap_or(defaults.store),
			database_url: self.database_url.unwrap_or(defaults.database_url),
			log_level: self.log_level.unwrap_or(defaults.log_level),
			log_format: self.log_format.unwrap_or(defaults.log_format),
		}
	}
}

/// Fully resolved configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportsConfig {
	pub lock_ttl_secs: u64,
	pub result_ttl_secs: u64,
	pub poll_interval_secs: u64,
	/// Simulated work time of the date-range report.
	pub job_delay_secs: u64,
	pub store: StoreBackend,
	pub database_url: String,
	pub log_level: String,
	pub log_format: LogFormat,
}

impl Default for ReportsConfig {
	fn default() -> Self {
		Self {
			lock_ttl_secs: 3600,    // 1 hour
			result_ttl_secs: 86400, // 1 day
			poll_interval_secs: 5,
			job_delay_secs: 10,
			store: StoreBackend::Memory,
			database_url: "sqlite:./loom-reports.db".to_string(),
			log_level: "info".to_string(),
			log_format: LogFormat::Text,
		}
	}
}

impl ReportsConfig {
	pub fn lock_ttl(&self) -> Duration {
		Duration::from_secs(self.lock_ttl_secs)
	}

	pub fn result_ttl(&self) -> Duration {
		Duration::from_secs(self.result_ttl_secs)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_secs(self.poll_interval_secs)
	}

	pub fn job_delay(&self) -> Duration {
		Duration::from_secs(self.job_delay_secs)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		for (key, value) in [
			("lock_ttl_secs", self.lock_ttl_secs),
			("result_ttl_secs", self.result_ttl_secs),
			("poll_interval_secs", self.poll_interval_secs),
		] {
			if value == 0 {
				return Err(ConfigError::Validation(format!("{key} must be greater than zero")));
			}
		}

		if self.store == StoreBackend::Sqlite && self.database_url.trim().is_empty() {
			return Err(ConfigError::Validation(
				"database_url is required for the sqlite store".to_string(),
			));
		}

		if self.store == StoreBackend::Sqlite && is_memory_database(&self.database_url) {
			return Err(ConfigError::Validation(
				"database_url must name a file; an in-memory sqlite database is not shared between pool connections"
					.to_string(),
			));
		}

		if self.lock_ttl_secs > self.result_ttl_secs {
			warn!(
				lock_ttl_secs = self.lock_ttl_secs,
				result_ttl_secs = self.result_ttl_secs,
				"lock outlives cached results"
			);
		}

		Ok(())
	}
}

fn is_memory_database(url: &str) -> bool {
	url.contains(":memory:") || url.contains("mode=memory")
}

/// Load configuration from defaults, the system config file and the environment.
pub fn load_config() -> Result<ReportsConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<PathBuf>,
) -> Result<ReportsConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ReportsConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ReportsConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	let config = merged.finalize();
	config.validate()?;

	info!(
		lock_ttl_secs = config.lock_ttl_secs,
		result_ttl_secs = config.result_ttl_secs,
		poll_interval_secs = config.poll_interval_secs,
		store = %config.store,
		"report configuration loaded"
	);

	Ok(config)
}
