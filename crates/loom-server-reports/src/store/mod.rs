// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key-value storage with per-key expiry.

mod memory;
mod sqlite;

pub use memory::InMemoryReportStore;
pub use sqlite::SqliteReportStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Key-value backend holding lock and result entries.
///
/// Expired entries must be indistinguishable from missing ones for every
/// read and for `set_if_absent_with_ttl`.
#[async_trait]
pub trait ReportStore: Send + Sync {
	async fn get(&self, key: &str) -> Result<Option<String>>;

	async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

	/// Writes `value` only when no live entry exists for `key`.
	///
	/// Returns `true` when this call created the entry. Two concurrent
	/// callers for the same key never both observe `true`.
	async fn set_if_absent_with_ttl(&self, key: &str, value: &str, ttl: Duration)
		-> Result<bool>;

	/// Removes `key`. Returns whether an entry was removed; a missing key is not an error.
	async fn delete(&self, key: &str) -> Result<bool>;

	/// Removes `key` only while its live value equals `value`.
	async fn delete_if_value(&self, key: &str, value: &str) -> Result<bool>;

	async fn exists(&self, key: &str) -> Result<bool> {
		Ok(self.get(key).await?.is_some())
	}

	/// Drops expired entries. Returns how many were removed.
	async fn purge_expired(&self) -> Result<u64>;
}
