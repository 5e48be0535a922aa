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

//! Contracts implemented by native backends and external collaborators.

mod native_command_list;
mod native_fence;
mod native_queue;
mod render_device;
mod shader_provider;
mod swap_chain;

pub use self::native_command_list::NativeCommandList;
pub use self::native_fence::NativeFence;
pub use self::native_queue::NativeQueue;
pub use self::render_device::RenderDevice;
pub use self::shader_provider::{ShaderBytecode, ShaderProvider};
pub use self::swap_chain::{PresentStatus, SwapChain};
