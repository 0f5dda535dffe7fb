// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use tracing::{debug, instrument};

use super::ReportStore;
use crate::error::{Result, StoreError};

/// SQLite-backed store. Entries survive process restarts, so a lock taken by
/// a crashed process still expires on schedule.
#[derive(Clone)]
pub struct SqliteReportStore {
	pool: SqlitePool,
}

impl SqliteReportStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Opens a WAL-mode pool for `database_url` and creates the table.
	#[instrument(skip(database_url))]
	pub async fn connect(database_url: &str) -> Result<Self> {
		let options = SqliteConnectOptions::from_str(database_url)
			.map_err(|e| StoreError::Internal(format!("Invalid database URL: {e}")))?
			.journal_mode(SqliteJournalMode::Wal)
			.synchronous(SqliteSynchronous::Normal)
			.create_if_missing(true);

		let pool = SqlitePool::connect_with(options).await?;
		debug!("report store pool created");

		let store = Self::new(pool);
		store.migrate().await?;
		Ok(store)
	}

	pub async fn migrate(&self) -> Result<()> {
		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS report_store (
				key TEXT PRIMARY KEY,
				value TEXT NOT NULL,
				expires_at INTEGER NOT NULL
			)
			"#,
		)
		.execute(&self.pool)
		.await?;

		sqlx::query(
			"CREATE INDEX IF NOT EXISTS idx_report_store_expires_at ON report_store (expires_at)",
		)
		.execute(&self.pool)
		.await?;

		Ok(())
	}
}

fn now_millis() -> i64 {
	Utc::now().timestamp_millis()
}

fn expires_at(now: i64, ttl: Duration) -> i64 {
	let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
	now.saturating_add(ttl_ms)
}

#[async_trait]
impl ReportStore for SqliteReportStore {
	#[instrument(skip(self))]
	async fn get(&self, key: &str) -> Result<Option<String>> {
		let value: Option<String> = sqlx::query_scalar(
			"SELECT value FROM report_store WHERE key = ? AND expires_at > ?",
		)
		.bind(key)
		.bind(now_millis())
		.fetch_optional(&self.pool)
		.await?;

		Ok(value)
	}

	#[instrument(skip(self, value))]
	async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
		let now = now_millis();
		sqlx::query(
			r#"
			INSERT INTO report_store (key, value, expires_at)
			VALUES (?, ?, ?)
			ON CONFLICT(key) DO UPDATE SET
				value = excluded.value,
				expires_at = excluded.expires_at
			"#,
		)
		.bind(key)
		.bind(value)
		.bind(expires_at(now, ttl))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[instrument(skip(self, value))]
	async fn set_if_absent_with_ttl(
		&self,
		key: &str,
		value: &str,
		ttl: Duration,
	) -> Result<bool> {
		let now = now_millis();
		// An expired row counts as absent and is overwritten in the same statement.
		let result = sqlx::query(
			r#"
			INSERT INTO report_store (key, value, expires_at)
			VALUES (?, ?, ?)
			ON CONFLICT(key) DO UPDATE SET
				value = excluded.value,
				expires_at = excluded.expires_at
			WHERE report_store.expires_at <= ?
			"#,
		)
		.bind(key)
		.bind(value)
		.bind(expires_at(now, ttl))
		.bind(now)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() == 1)
	}

	#[instrument(skip(self))]
	async fn delete(&self, key: &str) -> Result<bool> {
		let result = sqlx::query("DELETE FROM report_store WHERE key = ?")
			.bind(key)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self, value))]
	async fn delete_if_value(&self, key: &str, value: &str) -> Result<bool> {
		let result = sqlx::query(
			"DELETE FROM report_store WHERE key = ? AND value = ? AND expires_at > ?",
		)
		.bind(key)
		.bind(value)
		.bind(now_millis())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self))]
	async fn exists(&self, key: &str) -> Result<bool> {
		let found: Option<i64> =
			sqlx::query_scalar("SELECT 1 FROM report_store WHERE key = ? AND expires_at > ?")
				.bind(key)
				.bind(now_millis())
				.fetch_optional(&self.pool)
				.await?;

		Ok(found.is_some())
	}

	#[instrument(skip(self))]
	async fn purge_expired(&self) -> Result<u64> {
		let result = sqlx::query("DELETE FROM report_store WHERE expires_at <= ?")
			.bind(now_millis())
			.execute(&self.pool)
			.await?;

		let removed = result.rows_affected();
		debug!(removed, "purged expired entries");
		Ok(removed)
	}
}
