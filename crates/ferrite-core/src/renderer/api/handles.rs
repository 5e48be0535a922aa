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

//! Opaque handles to native objects.
//!
//! Handles are plain integers. The core never dereferences them; it only hands
//! them back to the backend that produced them.

use super::descriptor::DescriptorHeapType;

/// A CPU-visible descriptor address, as produced by a descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CpuDescriptorHandle(pub u64);

impl CpuDescriptorHandle {
    /// Returns the handle `index` descriptors past this one.
    pub const fn offset(self, index: u32, increment: u32) -> Self {
        Self(self.0 + index as u64 * increment as u64)
    }
}

/// A GPU-visible descriptor address inside a shader-visible heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GpuDescriptorHandle(pub u64);

impl GpuDescriptorHandle {
    /// Returns the handle `index` descriptors past this one.
    pub const fn offset(self, index: u32, increment: u32) -> Self {
        Self(self.0 + index as u64 * increment as u64)
    }
}

/// A GPU virtual address of buffer memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GpuVirtualAddress(pub u64);

/// An opaque handle to a native buffer or texture allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeResourceId(pub u64);

/// An opaque handle to a native descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHeapId(pub u64);

/// An opaque handle to a native pipeline state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativePipelineId(pub u64);

/// An opaque handle to a native root signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeRootSignatureId(pub u64);

/// A native descriptor heap as returned by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeDescriptorHeap {
    /// The backend handle of the heap.
    pub id: NativeHeapId,
    /// The kind of descriptors the heap stores.
    pub heap_type: DescriptorHeapType,
    /// The number of descriptors the heap can hold.
    pub capacity: u32,
    /// The byte distance between two consecutive descriptors.
    pub increment: u32,
    /// The CPU handle of descriptor 0.
    pub cpu_start: CpuDescriptorHandle,
    /// The GPU handle of descriptor 0, for shader-visible heaps only.
    pub gpu_start: Option<GpuDescriptorHandle>,
}

impl NativeDescriptorHeap {
    /// The CPU handle of descriptor `index`.
    pub const fn cpu_handle(&self, index: u32) -> CpuDescriptorHandle {
        self.cpu_start.offset(index, self.increment)
    }

    /// The GPU handle of descriptor `index`, for shader-visible heaps.
    pub fn gpu_handle(&self, index: u32) -> Option<GpuDescriptorHandle> {
        self.gpu_start
            .map(|start| start.offset(index, self.increment))
    }
}

/// The kind of backend that is driving the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    /// Microsoft's DirectX 12 API.
    Dx12,
    /// A software timeline without a real GPU.
    #[default]
    Headless,
}

/// Basic information about the adapter behind a device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdapterInfo {
    /// The adapter name as reported by the driver.
    pub name: String,
    /// The backend driving the adapter.
    pub backend: BackendKind,
    /// `true` when rendering happens on the CPU.
    pub software: bool,
}
