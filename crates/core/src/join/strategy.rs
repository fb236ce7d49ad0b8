/*
Copyright 2024-2025 The Canonica Authors

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

     https://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! The join strategy selector (§4.10): picks hash vs. nested-loop and which
//! side builds, from estimated row counts.

use crate::model::federation::{JoinStrategy, JoinType};

const HASH_SPILL_THRESHOLD: i64 = 100_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinConfig {
    pub join_type: JoinType,
    pub build_key: String,
    pub probe_key: String,
    pub strategy: JoinStrategy,
    pub allow_spill: bool,
}

/// Returns the `JoinConfig` plus whether the *left* input is the build side.
///
/// - `CROSS` always uses nested-loop, left materialized, right streamed
///   (§4.10) — `allow_cross_spill` is the configurable default of §9 Open
///   Question (b).
/// - Otherwise: hash join, build side is whichever input has fewer estimated
///   rows; spill is enabled only when *both* sides are at or above the
///   100k-row threshold.
pub fn select(
    join_type: JoinType,
    left_key: &str,
    right_key: &str,
    left_estimated_rows: i64,
    right_estimated_rows: i64,
    allow_cross_spill: bool,
) -> (JoinConfig, bool) {
    if join_type == JoinType::Cross {
        return (
            JoinConfig {
                join_type,
                build_key: left_key.to_string(),
                probe_key: right_key.to_string(),
                strategy: JoinStrategy::NestedLoop,
                allow_spill: allow_cross_spill,
            },
            true,
        );
    }

    let left_is_build = left_estimated_rows <= right_estimated_rows;
    let allow_spill = left_estimated_rows >= HASH_SPILL_THRESHOLD && right_estimated_rows >= HASH_SPILL_THRESHOLD;

    let (build_key, probe_key) = if left_is_build {
        (left_key.to_string(), right_key.to_string())
    } else {
        (right_key.to_string(), left_key.to_string())
    };

    (JoinConfig { join_type, build_key, probe_key, strategy: JoinStrategy::Hash, allow_spill }, left_is_build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smaller_side_is_build_and_spill_disabled_below_threshold() {
        let (config, left_is_build) = select(JoinType::Inner, "l", "r", 10, 1_000_000, true);
        assert!(left_is_build);
        assert_eq!(config.strategy, JoinStrategy::Hash);
        assert!(!config.allow_spill);
    }

    #[test]
    fn spill_enabled_when_both_sides_at_or_above_threshold() {
        let (config, left_is_build) = select(JoinType::Inner, "l", "r", 150_000, 500_000, true);
        assert!(left_is_build);
        assert!(config.allow_spill);
    }

    #[test]
    fn cross_join_always_uses_nested_loop() {
        let (config, left_is_build) = select(JoinType::Cross, "l", "r", 5, 9_000_000, true);
        assert!(left_is_build);
        assert_eq!(config.strategy, JoinStrategy::NestedLoop);
    }
}
