// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job requests, cache values and dispatch messages.

use std::fmt;

use crate::error::{CoreError, Result};

/// Default admission bound for submitted indexes.
pub const DEFAULT_MAX_INDEX: u32 = 40;

/// Largest index whose result still fits in a `u64`.
pub const MAX_SUPPORTED_INDEX: u32 = 92;

/// Cache value stored for an index that has been submitted but not computed.
pub const PENDING_SENTINEL: &str = "Nothing yet!";

/// Default name of the dispatch channel.
pub const DEFAULT_CHANNEL: &str = "insert";

/// An accepted job request.
///
/// Only obtainable through [`JobRequest::parse`] or [`JobRequest::new`], so
/// holding one means the index passed validation against some bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobRequest {
    index: u32,
}

impl JobRequest {
    /// Validate a numeric index against `max_index`.
    pub fn new(index: i64, max_index: u32) -> Result<Self> {
        if index < 0 {
            return Err(CoreError::validation("index", "Index must not be negative"));
        }
        if index > i64::from(max_index) {
            return Err(CoreError::validation("index", "Index too high"));
        }
        Ok(Self {
            index: index as u32,
        })
    }

    /// Parse and validate a raw index as sent by a client.
    ///
    /// Missing, empty, or non-decimal input is rejected rather than coerced.
    pub fn parse(raw: Option<&str>, max_index: u32) -> Result<Self> {
        let raw = raw
            .map(str::trim)
            .ok_or_else(|| CoreError::validation("index", "Index is required"))?;

        if raw.is_empty() {
            return Err(CoreError::validation("index", "Index is required"));
        }

        let digits = raw.strip_prefix('-').unwrap_or(raw);
        if !digits.bytes().all(|b| b.is_ascii_digit()) || digits.is_empty() {
            return Err(CoreError::validation(
                "index",
                format!("Index must be an integer, got '{}'", raw),
            ));
        }

        // Anything that overflows i64 is certainly above the bound.
        let index: i64 = match raw.parse() {
            Ok(index) => index,
            Err(_) if raw.starts_with('-') => {
                return Err(CoreError::validation("index", "Index must not be negative"));
            }
            Err(_) => return Err(CoreError::validation("index", "Index too high")),
        };

        Self::new(index, max_index)
    }

    /// The validated index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Cache key for this index.
    pub fn cache_key(&self) -> String {
        self.index.to_string()
    }
}

/// Decoded value of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheValue {
    /// Submitted, not yet computed.
    Pending,
    /// Computed result.
    Ready(u64),
}

impl CacheValue {
    /// Wire form stored in the cache.
    pub fn encode(&self) -> String {
        match self {
            Self::Pending => PENDING_SENTINEL.to_string(),
            Self::Ready(value) => value.to_string(),
        }
    }

    /// Decode a stored value. Returns `None` for values that are neither the
    /// sentinel nor a decimal integer.
    pub fn decode(raw: &str) -> Option<Self> {
        if raw == PENDING_SENTINEL {
            return Some(Self::Pending);
        }
        raw.parse().ok().map(Self::Ready)
    }

    /// Whether the entry still awaits a worker.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for CacheValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Notification that an index was submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchMessage {
    /// Channel the message travelled on.
    pub channel: String,
    /// Submitted index.
    pub index: u32,
}

impl DispatchMessage {
    /// Create a message for `index` on `channel`.
    pub fn new(channel: impl Into<String>, index: u32) -> Self {
        Self {
            channel: channel.into(),
            index,
        }
    }

    /// Payload as published on the wire.
    pub fn payload(&self) -> String {
        self.index.to_string()
    }

    /// Rebuild a message from a received wire payload.
    pub fn from_payload(channel: &str, payload: &str) -> Result<Self> {
        let index = payload.trim().parse().map_err(|_| CoreError::Dispatch {
            operation: "decode".to_string(),
            details: format!("invalid payload '{}' on channel '{}'", payload, channel),
        })?;
        Ok(Self::new(channel, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_bounds() {
        assert_eq!(JobRequest::parse(Some("0"), 40).unwrap().index(), 0);
        assert_eq!(JobRequest::parse(Some("40"), 40).unwrap().index(), 40);
        assert_eq!(JobRequest::parse(Some(" 7 "), 40).unwrap().index(), 7);
    }

    #[test]
    fn test_parse_rejects_above_bound() {
        let err = JobRequest::parse(Some("41"), 40).unwrap_err();
        assert_eq!(err.to_string(), "Validation error for 'index': Index too high");

        let err = JobRequest::parse(Some("99999999999999999999999"), 40).unwrap_err();
        assert!(err.to_string().contains("Index too high"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["", "   ", "abc", "4.5", "1e3", "0x10", "--1", "-"] {
            let err = JobRequest::parse(Some(raw), 40).unwrap_err();
            assert!(err.is_client_error(), "{raw:?} should be rejected");
        }
        assert!(JobRequest::parse(None, 40).is_err());
    }

    #[test]
    fn test_parse_rejects_negative() {
        let err = JobRequest::parse(Some("-3"), 40).unwrap_err();
        assert!(err.to_string().contains("negative"));

        let err = JobRequest::parse(Some("-99999999999999999999999"), 40).unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn test_new_checks_bound() {
        assert!(JobRequest::new(5, 5).is_ok());
        assert!(JobRequest::new(6, 5).is_err());
        assert!(JobRequest::new(-1, 5).is_err());
    }

    #[test]
    fn test_cache_value_decode() {
        assert_eq!(CacheValue::decode(PENDING_SENTINEL), Some(CacheValue::Pending));
        assert_eq!(CacheValue::decode("89"), Some(CacheValue::Ready(89)));
        assert_eq!(CacheValue::decode("garbage"), None);
        assert_eq!(CacheValue::Ready(89).encode(), "89");
        assert_eq!(CacheValue::Pending.to_string(), PENDING_SENTINEL);
    }

    #[test]
    fn test_dispatch_payload() {
        let msg = DispatchMessage::new(DEFAULT_CHANNEL, 12);
        assert_eq!(msg.payload(), "12");
        assert_eq!(DispatchMessage::from_payload("insert", "12").unwrap(), msg);
        assert!(DispatchMessage::from_payload("insert", "twelve").is_err());
    }
}
