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

//! The public-facing SDK of Ferrite.
//!
//! This crate wires the command-submission core of `ferrite-core` and the
//! backends of `ferrite-infra` into a [`Backend`] driving a frame loop, and
//! provides its configuration, the built-in technique catalog and logger
//! initialization.

#![warn(missing_docs)]

pub mod backend;
pub mod catalog;
pub mod config;
pub mod logging;

pub use backend::{Backend, Frame, FrameStats};
pub use catalog::{BuiltinCatalog, BuiltinTechniques};
pub use config::{BackendConfig, ConfigError};
pub use logging::{init_logging, init_logging_with};

/// The types needed to drive a [`Backend`] and record frames.
pub mod prelude {
    pub use crate::backend::{Backend, Frame, FrameStats};
    pub use crate::catalog::{compute_root, scene_root, BuiltinTechniques};
    pub use crate::config::BackendConfig;
    pub use ferrite_core::renderer::{
        BufferDescriptor, CommandList, CommandListStats, GpuResource, HeapKind, PresentStatus,
        RenderError, ResourceDescriptor, ResourceState, ShaderResourceRange,
        ShaderResourceViewDesc, ShaderStage, SlotRecorder, TechniqueId, Techniques,
        UnorderedAccessRange, UnorderedAccessViewDesc,
    };
    pub use ferrite_infra::{DirectoryShaderProvider, MemoryShaderProvider};
}
