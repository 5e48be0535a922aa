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

//! Defines the hierarchy of error types for the rendering core.
//!
//! The categories mirror how failures are meant to be handled:
//!
//! - [`DeviceError`]: a native object could not be created or a submission was
//!   rejected. These are unrecoverable environment failures; they carry the
//!   native status code and are never retried.
//! - [`CapacityError`]: a fixed-capacity pool ran out of slots. Distinct from a
//!   device failure so an embedding application can tell a sizing bug apart from
//!   a broken driver.
//! - [`ViewError::Expired`]: a view was requested for a resource whose owner
//!   already released it. Recoverable; the caller decides what it means.
//!
//! [`RenderError`] aggregates everything for callers that only need to bubble up.

use crate::renderer::api::{DescriptorHeapType, ShaderStage, ViewKind};
use crate::renderer::pipeline::{RootSignatureId, TechniqueId};
use std::fmt;
use thiserror::Error;

/// Generic failure status reported by native APIs.
pub const STATUS_FAIL: u32 = 0x8000_4005;
/// The native API ran out of memory while creating an object.
pub const STATUS_OUT_OF_MEMORY: u32 = 0x8007_000E;
/// An argument handed to the native API was rejected.
pub const STATUS_INVALID_ARG: u32 = 0x8007_0057;
/// The device was removed (driver crash, TDR, adapter unplugged).
pub const STATUS_DEVICE_REMOVED: u32 = 0x887A_0005;

/// The kind of native object an operation was acting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeObject {
    /// The device itself.
    Device,
    /// A descriptor heap.
    DescriptorHeap,
    /// A buffer or texture allocation.
    Resource,
    /// A root signature.
    RootSignature,
    /// A pipeline state object.
    PipelineState,
    /// A hardware command queue.
    CommandQueue,
    /// A command list or its allocator.
    CommandList,
    /// A fence.
    Fence,
    /// A submission to a command queue.
    Submission,
}

impl fmt::Display for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NativeObject::Device => "device",
            NativeObject::DescriptorHeap => "descriptor heap",
            NativeObject::Resource => "resource",
            NativeObject::RootSignature => "root signature",
            NativeObject::PipelineState => "pipeline state",
            NativeObject::CommandQueue => "command queue",
            NativeObject::CommandList => "command list",
            NativeObject::Fence => "fence",
            NativeObject::Submission => "submission",
        };
        f.write_str(name)
    }
}

/// A native API call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("native {object} operation failed: {message} (status {code:#010x})")]
pub struct DeviceError {
    /// The kind of object the failing call was acting on.
    pub object: NativeObject,
    /// The native status code.
    pub code: u32,
    /// A human readable description.
    pub message: String,
}

impl DeviceError {
    /// Creates a new error for `object` with an explicit status code.
    pub fn new(object: NativeObject, code: u32, message: impl Into<String>) -> Self {
        Self {
            object,
            code,
            message: message.into(),
        }
    }

    /// Creates a new error for `object` carrying the generic failure status.
    pub fn failed(object: NativeObject, message: impl Into<String>) -> Self {
        Self::new(object, STATUS_FAIL, message)
    }

    /// Returns `true` if the status says the device is gone.
    pub fn is_device_removed(&self) -> bool {
        self.code == STATUS_DEVICE_REMOVED
    }
}

/// A fixed-capacity pool could not satisfy a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{pool} exhausted: {requested} slot(s) requested with {in_use} of {capacity} already in use"
)]
pub struct CapacityError {
    /// The name of the exhausted pool.
    pub pool: &'static str,
    /// The total number of slots the pool owns.
    pub capacity: u32,
    /// The number of slots already handed out.
    pub in_use: u32,
    /// The number of slots the failing reservation asked for.
    pub requested: u32,
}

impl CapacityError {
    /// Names the pool backing a descriptor heap type.
    pub fn pool_name(heap_type: DescriptorHeapType) -> &'static str {
        match heap_type {
            DescriptorHeapType::Rtv => "RTV descriptor pool",
            DescriptorHeapType::Dsv => "DSV descriptor pool",
            DescriptorHeapType::CbvSrvUav => "CBV/SRV/UAV descriptor pool",
        }
    }
}

/// A resource view could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// The resource the view should describe has already been released.
    #[error("the resource backing the view has already been released")]
    Expired,
    /// The descriptor pool for this view kind is exhausted.
    #[error(transparent)]
    Capacity(#[from] CapacityError),
}

/// Misuse of the per-frame GPU-visible descriptor heap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    /// No descriptor table is cached for this root parameter in the current epoch.
    #[error("no descriptor table is cached for root parameter {root_index}")]
    TableNotCached {
        /// The root parameter index that was addressed.
        root_index: u32,
    },
    /// The staging offset lies outside of the cached table.
    #[error("offset {offset} is outside of the {size}-descriptor table at root parameter {root_index}")]
    OffsetOutOfRange {
        /// The root parameter index that was addressed.
        root_index: u32,
        /// The offending offset.
        offset: u32,
        /// The size of the cached table.
        size: u32,
    },
    /// Only CBV/SRV/UAV views can be staged into a shader-visible table.
    #[error("a {kind:?} view cannot be staged into a CBV/SRV/UAV descriptor table")]
    IncompatibleView {
        /// The kind of the rejected view.
        kind: ViewKind,
    },
    /// The view's resource was released before the view could be staged.
    #[error("the staged view's resource has already been released")]
    ExpiredView,
    /// The per-frame descriptor budget is exhausted.
    #[error(transparent)]
    Capacity(#[from] CapacityError),
}

/// An error raised by a shader provider.
#[derive(Debug, Error)]
pub enum ShaderError {
    /// No byte code exists for the requested shader.
    #[error("shader '{name}' ({stage:?}, entry point '{entry_point}') was not found")]
    NotFound {
        /// The shader name.
        name: String,
        /// The requested entry point.
        entry_point: String,
        /// The requested stage.
        stage: ShaderStage,
    },
    /// The byte code could not be read.
    #[error("failed to read shader byte code from '{path}'")]
    Io {
        /// The path that failed to load.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The provider returned an empty blob.
    #[error("shader '{name}' produced empty byte code")]
    EmptyBytecode {
        /// The shader name.
        name: String,
    },
    /// The external compiler rejected the shader.
    #[error("shader '{name}' failed to compile: {details}")]
    Compilation {
        /// The shader name.
        name: String,
        /// Compiler diagnostics.
        details: String,
    },
}

/// An error raised by the technique registry.
#[derive(Debug, Error)]
pub enum TechniqueError {
    /// The id does not name a registered technique.
    #[error("unknown technique {0:?}")]
    UnknownTechnique(TechniqueId),
    /// The id does not name a registered root signature.
    #[error("unknown root signature {0:?}")]
    UnknownRootSignature(RootSignatureId),
    /// A shader stage of the technique could not be loaded.
    #[error("technique '{technique}' could not load its shaders")]
    Shader {
        /// The label of the technique being built.
        technique: String,
        /// The provider failure.
        #[source]
        source: ShaderError,
    },
    /// The native root signature or pipeline object could not be created.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// A command list or command queue was driven out of order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// A recording operation was issued on a closed command list.
    #[error("command list '{label}' is not recording")]
    NotRecording {
        /// The label of the list.
        label: String,
    },
    /// The ring wrapped onto a slot whose list was never executed.
    #[error("ring slot {slot} of queue '{queue}' is still recording and cannot be reused")]
    SlotStillRecording {
        /// The label of the queue.
        queue: String,
        /// The slot index.
        slot: usize,
    },
    /// A native call failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// A high-level error that can occur anywhere in the rendering core.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A native API call failed.
    #[error("graphics device failure: {0}")]
    Device(#[from] DeviceError),
    /// A fixed-capacity pool was exhausted.
    #[error("capacity exceeded: {0}")]
    Capacity(#[from] CapacityError),
    /// A view could not be created.
    #[error("view creation failed: {0}")]
    View(#[from] ViewError),
    /// The dynamic descriptor heap was misused.
    #[error("descriptor heap error: {0}")]
    Heap(#[from] HeapError),
    /// A shader could not be provided.
    #[error("shader error: {0}")]
    Shader(#[from] ShaderError),
    /// The technique registry failed.
    #[error("technique error: {0}")]
    Technique(#[from] TechniqueError),
    /// A command list or queue was driven out of order.
    #[error("command error: {0}")]
    Command(#[from] CommandError),
    /// The swap chain failed to present.
    #[error("presentation failed: {0}")]
    Presentation(String),
}

impl RenderError {
    /// Returns `true` for errors the process cannot recover from.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RenderError::View(ViewError::Expired))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn device_error_display_carries_status_code() {
        let err = DeviceError::failed(NativeObject::PipelineState, "invalid blend state");
        assert_eq!(
            format!("{err}"),
            "native pipeline state operation failed: invalid blend state (status 0x80004005)"
        );
        assert!(!err.is_device_removed());
        assert!(DeviceError::new(NativeObject::Device, STATUS_DEVICE_REMOVED, "gone")
            .is_device_removed());
    }

    #[test]
    fn capacity_error_names_the_pool() {
        let err = CapacityError {
            pool: CapacityError::pool_name(DescriptorHeapType::Rtv),
            capacity: 32,
            in_use: 32,
            requested: 1,
        };
        assert_eq!(
            format!("{err}"),
            "RTV descriptor pool exhausted: 1 slot(s) requested with 32 of 32 already in use"
        );
    }

    #[test]
    fn render_error_wraps_technique_shader_failure() {
        let shader_err = ShaderError::NotFound {
            name: "scene".to_string(),
            entry_point: "VSMain".to_string(),
            stage: ShaderStage::Vertex,
        };
        let technique_err = TechniqueError::Shader {
            technique: "Forward".to_string(),
            source: shader_err,
        };
        let render_err: RenderError = technique_err.into();
        assert_eq!(
            format!("{render_err}"),
            "technique error: technique 'Forward' could not load its shaders"
        );
        let source = render_err.source().expect("technique error is the source");
        assert!(source.source().is_some(), "shader error is chained");
    }

    #[test]
    fn only_expired_views_are_recoverable() {
        assert!(!RenderError::from(ViewError::Expired).is_fatal());
        let capacity = CapacityError {
            pool: "dynamic heap",
            capacity: 128,
            in_use: 128,
            requested: 4,
        };
        assert!(RenderError::from(ViewError::Capacity(capacity)).is_fatal());
    }
}
