// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};

use super::ReportStore;
use crate::error::Result;

struct Entry {
	value: String,
	expires_at: Instant,
}

impl Entry {
	fn is_live(&self, now: Instant) -> bool {
		self.expires_at > now
	}
}

/// Process-local store. Expiry follows the tokio clock, so paused-time tests
/// can advance past a TTL without sleeping.
///
/// An expired entry is evicted when its key is next touched. Keys that are
/// never touched again are left for `purge_expired`.
#[derive(Default)]
pub struct InMemoryReportStore {
	entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryReportStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored entries, expired ones included until purged.
	pub async fn len(&self) -> usize {
		self.entries.lock().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.lock().await.is_empty()
	}
}

fn expiry(now: Instant, ttl: Duration) -> Instant {
	now.checked_add(ttl)
		.unwrap_or_else(|| now + Duration::from_secs(100 * 365 * 86_400))
}

/// Returns the live entry for `key`, evicting it first if it has expired.
fn live_entry<'a>(
	entries: &'a mut HashMap<String, Entry>,
	key: &str,
	now: Instant,
) -> Option<&'a Entry> {
	if entries.get(key).is_some_and(|e| !e.is_live(now)) {
		entries.remove(key);
	}
	entries.get(key)
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
	async fn get(&self, key: &str) -> Result<Option<String>> {
		let mut entries = self.entries.lock().await;
		Ok(live_entry(&mut entries, key, Instant::now()).map(|e| e.value.clone()))
	}

	async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
		let now = Instant::now();
		self.entries.lock().await.insert(
			key.to_string(),
			Entry {
				value: value.to_string(),
				expires_at: expiry(now, ttl),
			},
		);
		Ok(())
	}

	async fn set_if_absent_with_ttl(
		&self,
		key: &str,
		value: &str,
		ttl: Duration,
	) -> Result<bool> {
		let mut entries = self.entries.lock().await;
		let now = Instant::now();
		if live_entry(&mut entries, key, now).is_some() {
			return Ok(false);
		}
		entries.insert(
			key.to_string(),
			Entry {
				value: value.to_string(),
				expires_at: expiry(now, ttl),
			},
		);
		Ok(true)
	}

	async fn delete(&self, key: &str) -> Result<bool> {
		Ok(self.entries.lock().await.remove(key).is_some())
	}

	async fn delete_if_value(&self, key: &str, value: &str) -> Result<bool> {
		let mut entries = self.entries.lock().await;
		let owned = live_entry(&mut entries, key, Instant::now()).is_some_and(|e| e.value == value);
		if owned {
			entries.remove(key);
		}
		Ok(owned)
	}

	#[instrument(skip(self))]
	async fn purge_expired(&self) -> Result<u64> {
		let mut entries = self.entries.lock().await;
		let now = Instant::now();
		let before = entries.len();
		entries.retain(|_, e| e.is_live(now));
		let removed = (before - entries.len()) as u64;
		debug!(removed, "purged expired entries");
		Ok(removed)
	}
}
