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

//! A software implementation of the native-API contracts.
//!
//! The headless backend has no window and no hardware behind it. Each hardware
//! queue is a worker thread that replays closed command lists in submission
//! order, so the asynchronous behaviour of a real GPU (fences completing later,
//! cross-queue waits, slots still in flight) can be exercised and observed.

mod command;
mod device;
mod fence;
mod queue;
mod state;
mod swap_chain;

pub use self::command::{Command, HeadlessCommandList};
pub use self::device::{HeadlessDevice, DEFAULT_HANG_TIMEOUT};
pub use self::fence::HeadlessFence;
pub use self::queue::HeadlessQueue;
pub use self::state::{DescriptorContent, ExecutionEvent, ValidationError};
pub use self::swap_chain::{HeadlessSwapChain, HeadlessSwapChainDesc};
