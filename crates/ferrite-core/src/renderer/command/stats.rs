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

use std::ops::AddAssign;

/// Counters collected while a command list records, reset on every list reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandListStats {
    /// Transition barriers emitted.
    pub barriers: u32,
    /// Native barrier calls issued; a batch counts once.
    pub barrier_calls: u32,
    /// Barrier requests skipped because the resource already was in the target state.
    pub redundant_barriers: u32,
    /// Draw calls, indexed or not.
    pub draws: u32,
    /// Compute dispatches.
    pub dispatches: u32,
    /// Pipeline state changes.
    pub pipeline_changes: u32,
    /// Descriptors copied into the shader-visible heap.
    pub descriptor_copies: u32,
}

impl AddAssign for CommandListStats {
    fn add_assign(&mut self, rhs: Self) {
        self.barriers += rhs.barriers;
        self.barrier_calls += rhs.barrier_calls;
        self.redundant_barriers += rhs.redundant_barriers;
        self.draws += rhs.draws;
        self.dispatches += rhs.dispatches;
        self.pipeline_changes += rhs.pipeline_changes;
        self.descriptor_copies += rhs.descriptor_copies;
    }
}
