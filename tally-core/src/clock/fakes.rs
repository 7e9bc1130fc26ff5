// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use crate::Clock;

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give another to
/// the code under test.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tally_core::{Clock, fakes::ManualClock};
///
/// let clock = ManualClock::at(100);
/// let shared = clock.clone();
/// clock.advance(Duration::from_nanos(50));
/// assert_eq!(shared.now_epoch_nanos(), 150);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    /// Create a clock reading `epoch_nanos`
    pub fn at(epoch_nanos: u64) -> Self {
        Self(Arc::new(AtomicU64::new(epoch_nanos)))
    }

    /// Jump to `epoch_nanos`
    pub fn set(&self, epoch_nanos: u64) {
        self.0.store(epoch_nanos, Ordering::SeqCst);
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_nanos(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}
