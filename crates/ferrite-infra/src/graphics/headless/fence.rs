// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use ferrite_core::renderer::error::{DeviceError, NativeObject, STATUS_DEVICE_REMOVED};
use ferrite_core::renderer::traits::NativeFence;
use ferrite_core::utils::lock;
use std::any::Any;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A fence backed by a mutex and a condition variable.
///
/// Blocking waits give up after the device's hang timeout and report the device
/// as removed, so a lost signal surfaces as an error instead of a deadlock.
#[derive(Debug)]
pub struct HeadlessFence {
    value: Mutex<u64>,
    reached: Condvar,
    hang_timeout: Duration,
}

impl HeadlessFence {
    pub(crate) fn new(initial_value: u64, hang_timeout: Duration) -> Self {
        Self {
            value: Mutex::new(initial_value),
            reached: Condvar::new(),
            hang_timeout,
        }
    }
}

impl NativeFence for HeadlessFence {
    fn completed_value(&self) -> u64 {
        *lock(&self.value)
    }

    fn wait_for_value(&self, value: u64) -> Result<(), DeviceError> {
        let deadline = Instant::now() + self.hang_timeout;
        let mut current = lock(&self.value);
        while *current < value {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DeviceError::new(
                    NativeObject::Fence,
                    STATUS_DEVICE_REMOVED,
                    format!(
                        "fence stuck at {} while waiting for {value} for {:?}",
                        *current, self.hang_timeout
                    ),
                ));
            }
            current = self
                .reached
                .wait_timeout(current, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| PoisonError::into_inner(poisoned).0);
        }
        Ok(())
    }

    fn signal(&self, value: u64) -> Result<(), DeviceError> {
        let mut current = lock(&self.value);
        if value > *current {
            *current = value;
            self.reached.notify_all();
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn signal_from_another_thread_wakes_the_waiter() {
        let fence = Arc::new(HeadlessFence::new(0, Duration::from_secs(5)));
        let signaler = {
            let fence = fence.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                fence.signal(3).expect("cpu signal");
            })
        };

        fence.wait_for_value(3).expect("value is reached");
        assert_eq!(fence.completed_value(), 3);
        signaler.join().expect("signaler finishes");
    }

    #[test]
    fn values_never_go_backwards() {
        let fence = HeadlessFence::new(5, Duration::from_secs(1));
        fence.signal(2).expect("cpu signal");
        assert_eq!(fence.completed_value(), 5);
    }

    #[test]
    fn a_value_that_never_arrives_reports_a_hung_device() {
        let fence = HeadlessFence::new(0, Duration::from_millis(10));
        let err = fence.wait_for_value(1).expect_err("nobody signals");
        assert!(err.is_device_removed());
    }
}
