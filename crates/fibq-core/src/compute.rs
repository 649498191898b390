// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The computed function.
//!
//! `fib(0) = fib(1) = 1`, `fib(n) = fib(n - 1) + fib(n - 2)`. Both
//! strategies are pure, so duplicate computations of the same index always
//! write identical values.

use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;
use crate::job::MAX_SUPPORTED_INDEX;

/// How a worker evaluates the recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComputeStrategy {
    /// Linear-time loop.
    #[default]
    Iterative,
    /// Direct exponential-time recursion.
    Recursive,
}

impl ComputeStrategy {
    /// Evaluate `fib(index)`. Returns `None` when the result overflows `u64`.
    pub fn compute(&self, index: u32) -> Option<u64> {
        if index > MAX_SUPPORTED_INDEX {
            return None;
        }
        match self {
            Self::Iterative => fib_iterative(index),
            Self::Recursive => Some(fib_recursive(index)),
        }
    }

    /// Name used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iterative => "iterative",
            Self::Recursive => "recursive",
        }
    }
}

impl FromStr for ComputeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iterative" => Ok(Self::Iterative),
            "recursive" => Ok(Self::Recursive),
            other => Err(format!("unknown compute strategy '{}'", other)),
        }
    }
}

/// Evaluate `fib(index)` on the blocking thread pool.
///
/// With a `timeout`, waiting stops once it elapses and an error is returned.
/// The computation itself can't be interrupted and runs to completion in the
/// background; its result is discarded.
pub async fn compute_blocking(
    strategy: ComputeStrategy,
    index: u32,
    timeout: Option<Duration>,
) -> Result<u64, CoreError> {
    let task = tokio::task::spawn_blocking(move || strategy.compute(index));

    let joined = match timeout {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .map_err(|_| CoreError::Compute {
                index,
                reason: format!("timed out after {}ms", limit.as_millis()),
            })?,
        None => task.await,
    };

    joined
        .map_err(|e| CoreError::Compute {
            index,
            reason: format!("compute task failed: {}", e),
        })?
        .ok_or_else(|| CoreError::Compute {
            index,
            reason: "result does not fit in 64 bits".to_string(),
        })
}

/// Canonical recurrence. Exponential in `index`.
pub fn fib_recursive(index: u32) -> u64 {
    if index < 2 {
        return 1;
    }
    fib_recursive(index - 1) + fib_recursive(index - 2)
}

/// Same values as [`fib_recursive`] in linear time.
pub fn fib_iterative(index: u32) -> Option<u64> {
    let (mut prev, mut curr) = (1u64, 1u64);
    for _ in 1..index {
        let next = prev.checked_add(curr)?;
        prev = curr;
        curr = next;
    }
    Some(curr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        for strategy in [ComputeStrategy::Iterative, ComputeStrategy::Recursive] {
            assert_eq!(strategy.compute(0), Some(1));
            assert_eq!(strategy.compute(1), Some(1));
            assert_eq!(strategy.compute(2), Some(2));
            assert_eq!(strategy.compute(10), Some(89));
        }
    }

    #[test]
    fn test_strategies_agree() {
        for index in 0..=25 {
            assert_eq!(
                fib_iterative(index),
                Some(fib_recursive(index)),
                "index {index}"
            );
        }
    }

    #[test]
    fn test_deterministic() {
        let first = ComputeStrategy::Iterative.compute(40);
        let second = ComputeStrategy::Iterative.compute(40);
        assert_eq!(first, second);
        assert_eq!(first, Some(165_580_141));
    }

    #[test]
    fn test_supported_ceiling() {
        assert_eq!(
            ComputeStrategy::Iterative.compute(MAX_SUPPORTED_INDEX),
            Some(12_200_160_415_121_876_738)
        );
        assert_eq!(fib_iterative(MAX_SUPPORTED_INDEX + 1), None);
        assert_eq!(ComputeStrategy::Recursive.compute(MAX_SUPPORTED_INDEX + 1), None);
    }

    #[tokio::test]
    async fn test_compute_blocking() {
        assert_eq!(
            compute_blocking(ComputeStrategy::Iterative, 10, None).await.unwrap(),
            89
        );

        let err = compute_blocking(ComputeStrategy::Iterative, MAX_SUPPORTED_INDEX + 1, None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "COMPUTE_FAILED");
    }

    #[tokio::test]
    async fn test_compute_blocking_timeout() {
        // fib_recursive(38) makes ~10^8 calls; a 1ms budget can't cover it.
        let err = compute_blocking(
            ComputeStrategy::Recursive,
            38,
            Some(Duration::from_millis(1)),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!("iterative".parse(), Ok(ComputeStrategy::Iterative));
        assert_eq!(" Recursive ".parse(), Ok(ComputeStrategy::Recursive));
        assert!("memo".parse::<ComputeStrategy>().is_err());
        assert_eq!(ComputeStrategy::default().as_str(), "iterative");
    }
}
