// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    fmt::Debug,
    time::{SystemTime, UNIX_EPOCH},
};

/// Module containing fake clocks for testing
///
/// To enable this module, you must enable the `test-util` feature.
#[cfg(feature = "test-util")]
pub mod fakes;

/// Source of wall-clock timestamps for points and exemplars.
///
/// Storages take the clock as a trait object so tests can drive time by hand.
pub trait Clock: Send + Sync + Debug {
    /// Nanoseconds since the Unix epoch
    fn now_epoch_nanos(&self) -> u64;
}

/// The system wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_nanos(&self) -> u64 {
        // a clock set before 1970 reads as the epoch; u64 nanos last until 2554
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::{Clock, SystemClock};

    #[test]
    fn system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        check!(SystemClock.now_epoch_nanos() > 1_577_836_800_000_000_000);
    }
}
