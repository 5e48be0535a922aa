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
use std::any::Any;
use std::fmt::Debug;

/// A native GPU completion counter.
pub trait NativeFence: Send + Sync + Debug + 'static {
    /// The last value written by the GPU (or by [`NativeFence::signal`]).
    fn completed_value(&self) -> u64;

    /// Blocks the calling thread until the completed value reaches `value`.
    /// ## Errors
    /// * `DeviceError` - If the device is lost while waiting.
    fn wait_for_value(&self, value: u64) -> Result<(), DeviceError>;

    /// Sets the completed value from the CPU side.
    fn signal(&self, value: u64) -> Result<(), DeviceError>;

    /// Allows a queue of the same backend to downcast the fence.
    fn as_any(&self) -> &dyn Any;
}
