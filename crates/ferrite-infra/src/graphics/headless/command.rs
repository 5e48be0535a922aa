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

use super::state::{DeviceState, ValidationError};
use ferrite_core::renderer::api::*;
use ferrite_core::renderer::error::{DeviceError, NativeObject};
use ferrite_core::renderer::traits::NativeCommandList;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A command recorded by a [`HeadlessCommandList`], replayed by a queue worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `set_viewports`.
    Viewports(Vec<Viewport>),
    /// `set_scissor_rects`.
    ScissorRects(Vec<ScissorRect>),
    /// `set_pipeline_state`.
    Pipeline(NativePipelineId),
    /// `set_root_signature`.
    RootSignature(PipelineBindPoint, NativeRootSignatureId),
    /// `set_root_descriptor_table`.
    DescriptorTable {
        /// The root the table is bound on.
        bind_point: PipelineBindPoint,
        /// The root parameter index.
        root_index: u32,
        /// The first descriptor of the table.
        base: GpuDescriptorHandle,
    },
    /// `set_root_constant_buffer_view`.
    RootConstantBuffer(PipelineBindPoint, u32, GpuVirtualAddress),
    /// `set_root_shader_resource_view`.
    RootShaderResource(PipelineBindPoint, u32, GpuVirtualAddress),
    /// `set_root_constants`.
    RootConstants {
        /// The root the constants are written on.
        bind_point: PipelineBindPoint,
        /// The root parameter index.
        root_index: u32,
        /// The 32-bit values.
        values: Vec<u32>,
    },
    /// `set_index_buffer`.
    IndexBuffer(IndexBufferView),
    /// `set_primitive_topology`.
    Topology(PrimitiveTopology),
    /// `set_descriptor_heaps`.
    DescriptorHeaps(Vec<NativeHeapId>),
    /// `set_render_targets`.
    RenderTargets(Vec<CpuDescriptorHandle>, Option<CpuDescriptorHandle>),
    /// `clear_render_target_view`.
    ClearRenderTarget(CpuDescriptorHandle, [f32; 4]),
    /// `clear_depth_stencil_view`.
    ClearDepthStencil(CpuDescriptorHandle, f32, u8),
    /// `draw_instanced`.
    Draw {
        /// Vertices per instance.
        vertex_count: u32,
        /// Instances.
        instance_count: u32,
    },
    /// `draw_indexed_instanced`.
    DrawIndexed {
        /// Indices per instance.
        index_count: u32,
        /// Instances.
        instance_count: u32,
    },
    /// `dispatch`.
    Dispatch(u32, u32, u32),
    /// `copy_buffer_region`.
    CopyBuffer {
        /// The written buffer.
        destination: NativeResourceId,
        /// The byte offset in the written buffer.
        destination_offset: u64,
        /// The read buffer.
        source: NativeResourceId,
        /// The byte offset in the read buffer.
        source_offset: u64,
        /// The number of bytes.
        size: u64,
    },
    /// `resource_barrier`, one batch.
    Barrier(Vec<TransitionBarrier>),
    /// `begin_event`.
    BeginEvent(String),
    /// `end_event`.
    EndEvent,
}

/// A command list of the headless backend.
///
/// Commands are kept as data until a queue worker replays them. A list remembers
/// its last submission so that resetting it while the worker has not finished
/// with it is caught.
pub struct HeadlessCommandList {
    kind: QueueKind,
    label: String,
    state: Arc<DeviceState>,
    open: bool,
    commands: Vec<Command>,
    recorded: Arc<[Command]>,
    in_flight: Option<Arc<AtomicBool>>,
}

impl HeadlessCommandList {
    pub(crate) fn new(kind: QueueKind, label: &str, state: Arc<DeviceState>) -> Self {
        Self {
            kind,
            label: label.to_string(),
            state,
            open: false,
            commands: Vec::new(),
            recorded: Arc::from(Vec::new()),
            in_flight: None,
        }
    }

    /// The debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns `true` while the list accepts commands.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The commands recorded since the last reset.
    pub fn commands(&self) -> &[Command] {
        if self.open {
            &self.commands
        } else {
            &self.recorded
        }
    }

    /// Hands the closed command stream to a queue and remembers the submission.
    pub(crate) fn submit(&mut self) -> Result<(Arc<[Command]>, Arc<AtomicBool>), DeviceError> {
        if self.open {
            return Err(DeviceError::failed(
                NativeObject::Submission,
                format!("command list '{}' is still open", self.label),
            ));
        }
        let done = Arc::new(AtomicBool::new(false));
        self.in_flight = Some(done.clone());
        Ok((self.recorded.clone(), done))
    }

    fn record(&mut self, command: Command) {
        if !self.open {
            self.state.report(ValidationError::ClosedList {
                list: self.label.clone(),
            });
            return;
        }
        self.commands.push(command);
    }
}

impl fmt::Debug for HeadlessCommandList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessCommandList")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("open", &self.open)
            .field("commands", &self.commands().len())
            .finish()
    }
}

impl NativeCommandList for HeadlessCommandList {
    fn kind(&self) -> QueueKind {
        self.kind
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        if let Some(done) = &self.in_flight {
            if !done.load(Ordering::Acquire) {
                self.state.report(ValidationError::ResetInFlight {
                    list: self.label.clone(),
                });
                return Err(DeviceError::failed(
                    NativeObject::CommandList,
                    format!("allocator of '{}' is still in use by the GPU", self.label),
                ));
            }
        }
        self.in_flight = None;
        self.commands.clear();
        self.recorded = Arc::from(Vec::new());
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if !self.open {
            return Err(DeviceError::failed(
                NativeObject::CommandList,
                format!("command list '{}' is already closed", self.label),
            ));
        }
        self.recorded = Arc::from(std::mem::take(&mut self.commands));
        self.open = false;
        Ok(())
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        self.record(Command::Viewports(viewports.to_vec()));
    }

    fn set_scissor_rects(&mut self, rects: &[ScissorRect]) {
        self.record(Command::ScissorRects(rects.to_vec()));
    }

    fn set_pipeline_state(&mut self, pipeline: NativePipelineId) {
        self.record(Command::Pipeline(pipeline));
    }

    fn set_root_signature(&mut self, bind_point: PipelineBindPoint, root_signature: NativeRootSignatureId) {
        self.record(Command::RootSignature(bind_point, root_signature));
    }

    fn set_root_descriptor_table(&mut self, bind_point: PipelineBindPoint, root_index: u32, base: GpuDescriptorHandle) {
        self.record(Command::DescriptorTable {
            bind_point,
            root_index,
            base,
        });
    }

    fn set_root_constant_buffer_view(
        &mut self,
        bind_point: PipelineBindPoint,
        root_index: u32,
        address: GpuVirtualAddress,
    ) {
        self.record(Command::RootConstantBuffer(bind_point, root_index, address));
    }

    fn set_root_shader_resource_view(
        &mut self,
        bind_point: PipelineBindPoint,
        root_index: u32,
        address: GpuVirtualAddress,
    ) {
        self.record(Command::RootShaderResource(bind_point, root_index, address));
    }

    fn set_root_constants(&mut self, bind_point: PipelineBindPoint, root_index: u32, values: &[u32], dest_offset: u32) {
        let mut padded = vec![0; dest_offset as usize];
        padded.extend_from_slice(values);
        self.record(Command::RootConstants {
            bind_point,
            root_index,
            values: padded,
        });
    }

    fn set_index_buffer(&mut self, view: &IndexBufferView) {
        self.record(Command::IndexBuffer(*view));
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.record(Command::Topology(topology));
    }

    fn set_descriptor_heaps(&mut self, heaps: &[NativeHeapId]) {
        self.record(Command::DescriptorHeaps(heaps.to_vec()));
    }

    fn set_render_targets(&mut self, render_targets: &[CpuDescriptorHandle], depth_stencil: Option<CpuDescriptorHandle>) {
        self.record(Command::RenderTargets(render_targets.to_vec(), depth_stencil));
    }

    fn clear_render_target_view(&mut self, view: CpuDescriptorHandle, color: [f32; 4]) {
        self.record(Command::ClearRenderTarget(view, color));
    }

    fn clear_depth_stencil_view(&mut self, view: CpuDescriptorHandle, depth: f32, stencil: u8) {
        self.record(Command::ClearDepthStencil(view, depth, stencil));
    }

    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32, _start_vertex: u32, _start_instance: u32) {
        self.record(Command::Draw {
            vertex_count,
            instance_count,
        });
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        _start_index: u32,
        _base_vertex: i32,
        _start_instance: u32,
    ) {
        self.record(Command::DrawIndexed {
            index_count,
            instance_count,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.record(Command::Dispatch(x, y, z));
    }

    fn copy_buffer_region(
        &mut self,
        destination: NativeResourceId,
        destination_offset: u64,
        source: NativeResourceId,
        source_offset: u64,
        size: u64,
    ) {
        self.record(Command::CopyBuffer {
            destination,
            destination_offset,
            source,
            source_offset,
            size,
        });
    }

    fn resource_barrier(&mut self, barriers: &[TransitionBarrier]) {
        self.record(Command::Barrier(barriers.to_vec()));
    }

    fn begin_event(&mut self, name: &str) {
        self.record(Command::BeginEvent(name.to_string()));
    }

    fn end_event(&mut self) {
        self.record(Command::EndEvent);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
