// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifier sanitization and store key derivation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ReportsError, Result};

/// Prefix of the store key holding a finished report.
pub const RESULT_KEY_PREFIX: &str = "result:";
/// Prefix of the store key marking a run as in flight.
pub const LOCK_KEY_PREFIX: &str = "lock:";

/// Store keys derived from a client-supplied identifier such as a date range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
	identifier: String,
	result_key: String,
	lock_key: String,
}

impl JobKey {
	/// Sanitizes `raw` and derives both keys from it.
	///
	/// Fails with [`ReportsError::InvalidIdentifier`] when nothing is left
	/// after sanitization.
	pub fn derive(raw: &str) -> Result<Self> {
		let identifier = sanitize_identifier(raw);
		if identifier.is_empty() {
			return Err(ReportsError::InvalidIdentifier);
		}

		Ok(Self {
			result_key: format!("{RESULT_KEY_PREFIX}{identifier}"),
			lock_key: format!("{LOCK_KEY_PREFIX}{identifier}"),
			identifier,
		})
	}

	/// The sanitized identifier both keys were derived from.
	pub fn identifier(&self) -> &str {
		&self.identifier
	}

	pub fn result_key(&self) -> &str {
		&self.result_key
	}

	pub fn lock_key(&self) -> &str {
		&self.lock_key
	}
}

impl fmt::Display for JobKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.identifier)
	}
}

/// Cleans an untrusted identifier before it becomes part of a store key.
///
/// Markup tags and percent-encoded octets are removed, any run of whitespace
/// or control characters collapses to one space, and the ends are trimmed.
/// A `<` that does not open a tag is kept.
pub fn sanitize_identifier(raw: &str) -> String {
	let without_tags = strip_tags(raw);
	let without_octets = strip_percent_octets(&without_tags);
	collapse_whitespace(&without_octets)
}

/// A tag starts at `<` followed by a letter, `/`, `!` or `?`, and runs to the
/// next `>`. Without a closing `>` the `<` is plain text.
fn strip_tags(input: &str) -> String {
	let chars: Vec<char> = input.chars().collect();
	let mut out = String::with_capacity(input.len());
	let mut i = 0;
	while i < chars.len() {
		if chars[i] == '<' && opens_tag(chars.get(i + 1)) {
			if let Some(close) = chars[i + 1..].iter().position(|&c| c == '>') {
				i += close + 2;
				continue;
			}
		}
		out.push(chars[i]);
		i += 1;
	}
	out
}

fn opens_tag(next: Option<&char>) -> bool {
	matches!(next, Some(c) if c.is_alphabetic() || matches!(*c, '/' | '!' | '?'))
}

/// Removes `%XX` octets until none are left, so `%%4141` reduces to nothing.
fn strip_percent_octets(input: &str) -> String {
	let mut current = input.to_string();
	loop {
		let next = strip_percent_octets_once(&current);
		if next == current {
			return next;
		}
		current = next;
	}
}

fn strip_percent_octets_once(input: &str) -> String {
	let chars: Vec<char> = input.chars().collect();
	let mut out = String::with_capacity(input.len());
	let mut i = 0;
	while i < chars.len() {
		if i + 3 <= chars.len() && is_percent_octet(&chars[i..i + 3]) {
			i += 3;
			continue;
		}
		out.push(chars[i]);
		i += 1;
	}
	out
}

fn is_percent_octet(window: &[char]) -> bool {
	window[0] == '%' && window[1].is_ascii_hexdigit() && window[2].is_ascii_hexdigit()
}

fn collapse_whitespace(input: &str) -> String {
	input
		.split(|c: char| c.is_whitespace() || c.is_control())
		.filter(|part| !part.is_empty())
		.collect::<Vec<_>>()
		.join(" ")
}
