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
use std::any::Any;
use std::fmt::Debug;

/// A native command allocator and command list pair.
///
/// Recording calls are infallible, as in the native APIs: a malformed list is
/// reported when it is closed or executed. The methods map one-to-one onto
/// native calls; the state tracking lives in
/// [`CommandList`](crate::renderer::CommandList).
pub trait NativeCommandList: Send + Debug + 'static {
    /// The kind of queue the list can be executed on.
    fn kind(&self) -> QueueKind;

    /// Resets the allocator and reopens the list for recording.
    fn reset(&mut self) -> Result<(), DeviceError>;

    /// Closes the list, making it ready for execution.
    fn close(&mut self) -> Result<(), DeviceError>;

    /// Sets the viewports.
    fn set_viewports(&mut self, viewports: &[Viewport]);

    /// Sets the scissor rectangles.
    fn set_scissor_rects(&mut self, rects: &[ScissorRect]);

    /// Binds a pipeline state object.
    fn set_pipeline_state(&mut self, pipeline: NativePipelineId);

    /// Binds the root signature of a bind point.
    fn set_root_signature(
        &mut self,
        bind_point: PipelineBindPoint,
        root_signature: NativeRootSignatureId,
    );

    /// Binds a descriptor table to a root parameter.
    fn set_root_descriptor_table(
        &mut self,
        bind_point: PipelineBindPoint,
        root_index: u32,
        base: GpuDescriptorHandle,
    );

    /// Binds a constant buffer by address to a root parameter.
    fn set_root_constant_buffer_view(
        &mut self,
        bind_point: PipelineBindPoint,
        root_index: u32,
        address: GpuVirtualAddress,
    );

    /// Binds a shader resource by address to a root parameter.
    fn set_root_shader_resource_view(
        &mut self,
        bind_point: PipelineBindPoint,
        root_index: u32,
        address: GpuVirtualAddress,
    );

    /// Writes inline 32-bit constants into a root parameter.
    fn set_root_constants(
        &mut self,
        bind_point: PipelineBindPoint,
        root_index: u32,
        values: &[u32],
        dest_offset: u32,
    );

    /// Binds an index buffer.
    fn set_index_buffer(&mut self, view: &IndexBufferView);

    /// Sets the primitive topology for subsequent draws.
    fn set_primitive_topology(&mut self, topology: PrimitiveTopology);

    /// Binds the shader-visible descriptor heaps.
    fn set_descriptor_heaps(&mut self, heaps: &[NativeHeapId]);

    /// Binds color and depth attachments.
    fn set_render_targets(
        &mut self,
        render_targets: &[CpuDescriptorHandle],
        depth_stencil: Option<CpuDescriptorHandle>,
    );

    /// Clears a render target view.
    fn clear_render_target_view(&mut self, view: CpuDescriptorHandle, color: [f32; 4]);

    /// Clears a depth-stencil view.
    fn clear_depth_stencil_view(&mut self, view: CpuDescriptorHandle, depth: f32, stencil: u8);

    /// Draws non-indexed primitives.
    fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    );

    /// Draws indexed primitives.
    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    );

    /// Dispatches compute thread groups.
    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    /// Copies a byte range between two buffers.
    fn copy_buffer_region(
        &mut self,
        destination: NativeResourceId,
        destination_offset: u64,
        source: NativeResourceId,
        source_offset: u64,
        size: u64,
    );

    /// Records a batch of transition barriers as one native call.
    fn resource_barrier(&mut self, barriers: &[TransitionBarrier]);

    /// Opens a named debug marker section.
    fn begin_event(&mut self, name: &str);

    /// Closes the innermost debug marker section.
    fn end_event(&mut self);

    /// Allows a queue of the same backend to downcast the list on submission.
    fn as_any(&self) -> &dyn Any;

    /// Mutable variant of [`NativeCommandList::as_any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
