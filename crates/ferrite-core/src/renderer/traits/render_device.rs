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

use crate::renderer::api::*;
use crate::renderer::error::DeviceError;
use crate::renderer::traits::{NativeCommandList, NativeFence, NativeQueue};
use std::fmt::Debug;
use std::sync::Arc;

/// The native device: the factory of every GPU object.
///
/// This is the single seam between the rendering core and a concrete graphics
/// API. Creation calls return [`DeviceError`] on failure; those failures are
/// never transient and callers do not retry them.
pub trait RenderDevice: Send + Sync + Debug + 'static {
    /// Returns information about the adapter behind this device.
    fn adapter_info(&self) -> AdapterInfo;

    /// Creates a descriptor heap.
    /// ## Arguments
    /// * `heap_type` - The kind of descriptors the heap stores.
    /// * `capacity` - The number of descriptors.
    /// * `shader_visible` - Whether shaders can read descriptors from the heap.
    /// ## Errors
    /// * `DeviceError` - If the heap cannot be created, or `shader_visible` is
    ///   requested for a heap type that does not support it.
    fn create_descriptor_heap(
        &self,
        heap_type: DescriptorHeapType,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<NativeDescriptorHeap, DeviceError>;

    /// Releases a descriptor heap.
    fn destroy_descriptor_heap(&self, id: NativeHeapId);

    /// Creates a committed buffer in `initial_state`.
    /// ## Errors
    /// * `DeviceError` - If the allocation fails.
    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_state: ResourceState,
    ) -> Result<NativeResourceId, DeviceError>;

    /// Creates a committed 2D texture in `initial_state`.
    /// ## Errors
    /// * `DeviceError` - If the allocation fails.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        initial_state: ResourceState,
    ) -> Result<NativeResourceId, DeviceError>;

    /// Releases a buffer or texture.
    fn destroy_resource(&self, id: NativeResourceId);

    /// The GPU virtual address of a buffer, or zero for textures.
    fn gpu_virtual_address(&self, id: NativeResourceId) -> GpuVirtualAddress;

    /// Writes `data` into a CPU-writable buffer at `offset`.
    /// ## Errors
    /// * `DeviceError` - If the buffer is not CPU-writable or the range is out of bounds.
    fn write_buffer(&self, id: NativeResourceId, offset: u64, data: &[u8])
        -> Result<(), DeviceError>;

    /// Writes a view of `resource` into the descriptor at `destination`.
    fn create_view(
        &self,
        resource: NativeResourceId,
        descriptor: &ViewDesc,
        destination: CpuDescriptorHandle,
    );

    /// Copies `count` contiguous descriptors from `source` to `destination`.
    fn copy_descriptors_simple(
        &self,
        count: u32,
        destination: CpuDescriptorHandle,
        source: CpuDescriptorHandle,
        heap_type: DescriptorHeapType,
    );

    /// Serializes and creates a root signature.
    /// ## Errors
    /// * `DeviceError` - If the layout is rejected.
    fn create_root_signature(
        &self,
        descriptor: &RootSignatureDesc,
    ) -> Result<NativeRootSignatureId, DeviceError>;

    /// Releases a root signature.
    fn destroy_root_signature(&self, id: NativeRootSignatureId);

    /// Creates a graphics pipeline state object.
    /// ## Errors
    /// * `DeviceError` - If the byte code or the fixed-function state is rejected.
    fn create_graphics_pipeline(
        &self,
        descriptor: &NativeGraphicsPipelineDesc,
    ) -> Result<NativePipelineId, DeviceError>;

    /// Creates a compute pipeline state object.
    /// ## Errors
    /// * `DeviceError` - If the byte code is rejected.
    fn create_compute_pipeline(
        &self,
        descriptor: &NativeComputePipelineDesc,
    ) -> Result<NativePipelineId, DeviceError>;

    /// Releases a pipeline state object.
    fn destroy_pipeline(&self, id: NativePipelineId);

    /// Creates a hardware command queue.
    fn create_command_queue(
        &self,
        kind: QueueKind,
        label: &str,
    ) -> Result<Box<dyn NativeQueue>, DeviceError>;

    /// Creates a command allocator and command list pair, in the closed state.
    fn create_command_list(
        &self,
        kind: QueueKind,
        label: &str,
    ) -> Result<Box<dyn NativeCommandList>, DeviceError>;

    /// Creates a fence whose completed value starts at `initial_value`.
    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn NativeFence>, DeviceError>;
}
