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

use crate::renderer::api::Format;
use crate::renderer::resource::GpuResource;
use std::fmt::Debug;
use std::sync::Arc;

/// The status code returned by a present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    /// The back buffer was queued for display.
    Presented,
    /// The output is not visible; nothing was displayed.
    Occluded,
    /// The present failed with a native status code.
    Failed(u32),
}

/// A rotating set of back buffers plus one depth buffer.
pub trait SwapChain: Send + Debug {
    /// The number of back buffers.
    fn back_buffer_count(&self) -> usize;

    /// The index of the back buffer that will be presented next.
    fn current_back_buffer_index(&self) -> usize;

    /// The back buffer at `index`, if it exists.
    fn back_buffer(&self, index: usize) -> Option<&Arc<GpuResource>>;

    /// The depth buffer shared by every back buffer.
    fn depth_buffer(&self) -> &Arc<GpuResource>;

    /// The size of the back buffers in pixels.
    fn extent(&self) -> (u32, u32);

    /// The format of the back buffers.
    fn format(&self) -> Format;

    /// The format of the depth buffer.
    fn depth_format(&self) -> Format;

    /// Presents the current back buffer and rotates to the next one.
    fn present(&mut self, sync_interval: u32) -> PresentStatus;
}
