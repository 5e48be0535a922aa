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

use crate::renderer::api::QueueKind;
use crate::renderer::error::DeviceError;
use crate::renderer::traits::{NativeCommandList, NativeFence};
use std::fmt::Debug;
use std::sync::Arc;

/// A hardware command queue.
///
/// Work submitted to one queue executes in submission order. No ordering exists
/// between queues except through [`NativeQueue::signal`] and [`NativeQueue::wait`].
pub trait NativeQueue: Send + Sync + Debug + 'static {
    /// The kind of work the queue accepts.
    fn kind(&self) -> QueueKind;

    /// Submits closed command lists for execution, in order.
    /// ## Errors
    /// * `DeviceError` - If a list is still open, belongs to another backend, or
    ///   the device has been lost.
    fn execute_command_lists(
        &self,
        lists: &mut [&mut dyn NativeCommandList],
    ) -> Result<(), DeviceError>;

    /// Makes the GPU write `value` into `fence` once all prior work has completed.
    fn signal(&self, fence: &Arc<dyn NativeFence>, value: u64) -> Result<(), DeviceError>;

    /// Makes subsequent work on this queue wait until `fence` reaches `value`.
    ///
    /// The wait happens on the GPU timeline; the calling thread is not blocked.
    fn wait(&self, fence: &Arc<dyn NativeFence>, value: u64) -> Result<(), DeviceError>;
}
