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

//! The backend-agnostic command-submission and resource-binding core.
//!
//! This module is split the same way the renderer is layered:
//!
//! - [`api`] holds plain data: handles, resource states, view and pipeline
//!   descriptions, command arguments.
//! - [`traits`] holds the contracts a native backend implements
//!   ([`RenderDevice`], [`NativeCommandList`], [`NativeQueue`], [`NativeFence`])
//!   and the external collaborators ([`ShaderProvider`], [`SwapChain`]).
//! - [`resource`], [`descriptor`], [`pipeline`] and [`command`] hold the logic
//!   that sits on top of those contracts: state-tracked resources, descriptor
//!   pools, the per-frame GPU-visible heap, the technique registry, command lists
//!   and command queues.
//!
//! The 'how' of talking to a GPU lives in `ferrite-infra`.

pub mod api;
pub mod command;
pub mod descriptor;
pub mod error;
pub mod pipeline;
pub mod resource;
pub mod traits;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::command::{
    CommandList, CommandListStats, CommandQueue, CommandQueueDesc, Fence, ListState,
    SlotRecorder, SlotReusePolicy,
};
pub use self::descriptor::{
    DescriptorHeapCollection, DescriptorPoolSizes, DynamicGpuHeap, ResourceDescriptor,
};
pub use self::error::{
    CapacityError, CommandError, DeviceError, HeapError, RenderError, ShaderError,
    TechniqueError, ViewError,
};
pub use self::pipeline::{
    RootSignature, RootSignatureId, Technique, TechniqueCatalog, TechniqueDesc, TechniqueId,
    Techniques,
};
pub use self::resource::{GpuResource, ResourceKind};
pub use self::traits::{
    NativeCommandList, NativeFence, NativeQueue, PresentStatus, RenderDevice, ShaderBytecode,
    ShaderProvider, SwapChain,
};
