// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_reports_core::JobKey;

/// Everything a run needs: the identifier and both derived keys.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
	pub run_id: String,
	pub key: JobKey,
}

impl ExecutionContext {
	pub fn new(key: JobKey) -> Self {
		Self {
			run_id: uuid::Uuid::new_v4().to_string(),
			key,
		}
	}

	pub fn identifier(&self) -> &str {
		self.key.identifier()
	}

	pub fn result_key(&self) -> &str {
		self.key.result_key()
	}

	pub fn lock_key(&self) -> &str {
		self.key.lock_key()
	}
}
