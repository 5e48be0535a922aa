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

use crate::renderer::error::DeviceError;
use crate::renderer::traits::{NativeFence, RenderDevice};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A monotonically increasing GPU completion counter.
///
/// The fence hands out strictly increasing target values starting at 1; the GPU
/// writes a target into the fence once the work submitted before the matching
/// signal has completed. Completed value `0` means nothing has completed yet.
pub struct Fence {
    native: Arc<dyn NativeFence>,
    last_issued: AtomicU64,
}

impl Fence {
    /// Creates a fence whose completed value is 0.
    pub fn new(device: &dyn RenderDevice) -> Result<Self, DeviceError> {
        Ok(Self {
            native: device.create_fence(0)?,
            last_issued: AtomicU64::new(0),
        })
    }

    /// Reserves the next target value.
    pub(crate) fn next_value(&self) -> u64 {
        self.last_issued.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// The last target value handed out, or 0 if none was.
    pub fn last_issued_value(&self) -> u64 {
        self.last_issued.load(Ordering::Acquire)
    }

    /// The last value the GPU has written.
    pub fn completed_value(&self) -> u64 {
        self.native.completed_value()
    }

    /// Returns `true` once the GPU has reached `value`.
    pub fn is_complete(&self, value: u64) -> bool {
        self.completed_value() >= value
    }

    /// Blocks until the GPU has reached `value`.
    ///
    /// Returns immediately, without touching the OS wait primitive, if the value
    /// is already reached. Returns `true` if the call had to block.
    pub fn wait_on_cpu(&self, value: u64) -> Result<bool, DeviceError> {
        if self.is_complete(value) {
            return Ok(false);
        }
        log::trace!("Waiting on CPU for fence value {value}");
        self.native.wait_for_value(value)?;
        Ok(true)
    }

    /// The native fence.
    pub fn native(&self) -> &Arc<dyn NativeFence> {
        &self.native
    }
}

impl fmt::Debug for Fence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fence")
            .field("last_issued", &self.last_issued_value())
            .field("completed", &self.completed_value())
            .finish()
    }
}
