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

//! Test doubles for the native contracts.
//!
//! The mock device hands out unique ids and records the calls tests care about.
//! Queues complete work synchronously: a signal reaches the fence immediately.

use crate::renderer::api::*;
use crate::renderer::command::CommandList;
use crate::renderer::error::{DeviceError, NativeObject, ShaderError, STATUS_INVALID_ARG};
use crate::renderer::traits::{
    NativeCommandList, NativeFence, NativeQueue, RenderDevice, ShaderBytecode, ShaderProvider,
};
use crate::utils::lock;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// The calls recorded by a [`MockDevice`].
#[derive(Debug, Default)]
pub struct MockCalls {
    pub buffer_writes: Vec<(NativeResourceId, u64, Vec<u8>)>,
    pub destroyed_resources: Vec<NativeResourceId>,
    pub destroyed_heaps: Vec<NativeHeapId>,
    pub destroyed_root_signatures: Vec<NativeRootSignatureId>,
    pub destroyed_pipelines: Vec<NativePipelineId>,
    pub views: Vec<(NativeResourceId, ViewKind, CpuDescriptorHandle)>,
    /// `(destination, source)` of every single-descriptor copy.
    pub descriptor_copies: Vec<(CpuDescriptorHandle, CpuDescriptorHandle)>,
}

/// A device producing unique native ids.
#[derive(Debug)]
pub struct MockDevice {
    next_id: AtomicU64,
    buffers: Mutex<HashSet<NativeResourceId>>,
    calls: Mutex<MockCalls>,
}

impl MockDevice {
    /// Returns the mock and the same device behind the trait object.
    pub fn shared() -> (Arc<MockDevice>, Arc<dyn RenderDevice>) {
        let mock = Arc::new(Self {
            next_id: AtomicU64::new(1),
            buffers: Mutex::new(HashSet::new()),
            calls: Mutex::new(MockCalls::default()),
        });
        let device: Arc<dyn RenderDevice> = mock.clone();
        (mock, device)
    }

    pub fn calls(&self) -> MutexGuard<'_, MockCalls> {
        lock(&self.calls)
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl RenderDevice for MockDevice {
    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: "Mock Adapter".to_string(),
            backend: BackendKind::Headless,
            software: true,
        }
    }

    fn create_descriptor_heap(
        &self,
        heap_type: DescriptorHeapType,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<NativeDescriptorHeap, DeviceError> {
        if shader_visible && !heap_type.can_be_shader_visible() {
            return Err(DeviceError::new(
                NativeObject::DescriptorHeap,
                STATUS_INVALID_ARG,
                "heap type cannot be shader visible",
            ));
        }
        let id = self.next();
        Ok(NativeDescriptorHeap {
            id: NativeHeapId(id),
            heap_type,
            capacity,
            increment: 32,
            cpu_start: CpuDescriptorHandle(id << 24),
            gpu_start: shader_visible.then_some(GpuDescriptorHandle(id << 24)),
        })
    }

    fn destroy_descriptor_heap(&self, id: NativeHeapId) {
        self.calls().destroyed_heaps.push(id);
    }

    fn create_buffer(
        &self,
        _descriptor: &BufferDescriptor,
        _initial_state: ResourceState,
    ) -> Result<NativeResourceId, DeviceError> {
        let id = NativeResourceId(self.next());
        lock(&self.buffers).insert(id);
        Ok(id)
    }

    fn create_texture(
        &self,
        _descriptor: &TextureDescriptor,
        _initial_state: ResourceState,
    ) -> Result<NativeResourceId, DeviceError> {
        Ok(NativeResourceId(self.next()))
    }

    fn destroy_resource(&self, id: NativeResourceId) {
        lock(&self.buffers).remove(&id);
        self.calls().destroyed_resources.push(id);
    }

    fn gpu_virtual_address(&self, id: NativeResourceId) -> GpuVirtualAddress {
        if lock(&self.buffers).contains(&id) {
            GpuVirtualAddress(id.0 << 32)
        } else {
            GpuVirtualAddress(0)
        }
    }

    fn write_buffer(&self, id: NativeResourceId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        self.calls().buffer_writes.push((id, offset, data.to_vec()));
        Ok(())
    }

    fn create_view(&self, resource: NativeResourceId, descriptor: &ViewDesc, destination: CpuDescriptorHandle) {
        self.calls().views.push((resource, descriptor.kind(), destination));
    }

    fn copy_descriptors_simple(
        &self,
        count: u32,
        destination: CpuDescriptorHandle,
        source: CpuDescriptorHandle,
        _heap_type: DescriptorHeapType,
    ) {
        let mut calls = self.calls();
        for index in 0..u64::from(count) {
            calls
                .descriptor_copies
                .push((CpuDescriptorHandle(destination.0 + index), CpuDescriptorHandle(source.0 + index)));
        }
    }

    fn create_root_signature(&self, _descriptor: &RootSignatureDesc) -> Result<NativeRootSignatureId, DeviceError> {
        Ok(NativeRootSignatureId(self.next()))
    }

    fn destroy_root_signature(&self, id: NativeRootSignatureId) {
        self.calls().destroyed_root_signatures.push(id);
    }

    fn create_graphics_pipeline(
        &self,
        _descriptor: &NativeGraphicsPipelineDesc,
    ) -> Result<NativePipelineId, DeviceError> {
        Ok(NativePipelineId(self.next()))
    }

    fn create_compute_pipeline(
        &self,
        _descriptor: &NativeComputePipelineDesc,
    ) -> Result<NativePipelineId, DeviceError> {
        Ok(NativePipelineId(self.next()))
    }

    fn destroy_pipeline(&self, id: NativePipelineId) {
        self.calls().destroyed_pipelines.push(id);
    }

    fn create_command_queue(&self, kind: QueueKind, _label: &str) -> Result<Box<dyn NativeQueue>, DeviceError> {
        Ok(Box::new(MockQueue { kind }))
    }

    fn create_command_list(&self, kind: QueueKind, _label: &str) -> Result<Box<dyn NativeCommandList>, DeviceError> {
        Ok(Box::new(MockCommandList {
            kind,
            open: false,
            commands: Vec::new(),
        }))
    }

    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn NativeFence>, DeviceError> {
        Ok(Arc::new(MockFence {
            completed: AtomicU64::new(initial_value),
            blocking_waits: AtomicU32::new(0),
        }))
    }
}

/// A command recorded by a [`MockCommandList`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    Viewports(Vec<Viewport>),
    ScissorRects(Vec<ScissorRect>),
    Pipeline(NativePipelineId),
    RootSignature(PipelineBindPoint, NativeRootSignatureId),
    DescriptorTable {
        bind_point: PipelineBindPoint,
        root_index: u32,
        base: GpuDescriptorHandle,
    },
    RootConstantBuffer(PipelineBindPoint, u32, GpuVirtualAddress),
    RootShaderResource(PipelineBindPoint, u32, GpuVirtualAddress),
    RootConstants {
        bind_point: PipelineBindPoint,
        root_index: u32,
        values: Vec<u32>,
        dest_offset: u32,
    },
    IndexBuffer(IndexBufferView),
    Topology(PrimitiveTopology),
    DescriptorHeaps(Vec<NativeHeapId>),
    RenderTargets(Vec<CpuDescriptorHandle>, Option<CpuDescriptorHandle>),
    ClearRenderTarget(CpuDescriptorHandle, [f32; 4]),
    ClearDepthStencil(CpuDescriptorHandle, f32, u8),
    Draw { vertex_count: u32, instance_count: u32 },
    DrawIndexed { index_count: u32, instance_count: u32 },
    Dispatch(u32, u32, u32),
    CopyBuffer {
        destination: NativeResourceId,
        source: NativeResourceId,
        size: u64,
    },
    Barrier(Vec<TransitionBarrier>),
    BeginEvent(String),
    EndEvent,
}

impl MockCommand {
    /// Everything recorded into `list` since its last reset.
    pub fn recorded(list: &CommandList) -> Vec<MockCommand> {
        list.native()
            .as_any()
            .downcast_ref::<MockCommandList>()
            .map(|native| native.commands.clone())
            .unwrap_or_default()
    }

    /// Every barrier recorded into `list`, flattened across batches.
    pub fn barriers(list: &CommandList) -> Vec<TransitionBarrier> {
        Self::recorded(list)
            .into_iter()
            .filter_map(|command| match command {
                MockCommand::Barrier(batch) => Some(batch),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

#[derive(Debug)]
pub struct MockCommandList {
    kind: QueueKind,
    open: bool,
    commands: Vec<MockCommand>,
}

impl MockCommandList {
    fn push(&mut self, command: MockCommand) {
        assert!(self.open, "{command:?} recorded into a closed list");
        self.commands.push(command);
    }
}

impl NativeCommandList for MockCommandList {
    fn kind(&self) -> QueueKind {
        self.kind
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        self.open = true;
        self.commands.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.open = false;
        Ok(())
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        self.push(MockCommand::Viewports(viewports.to_vec()));
    }

    fn set_scissor_rects(&mut self, rects: &[ScissorRect]) {
        self.push(MockCommand::ScissorRects(rects.to_vec()));
    }

    fn set_pipeline_state(&mut self, pipeline: NativePipelineId) {
        self.push(MockCommand::Pipeline(pipeline));
    }

    fn set_root_signature(&mut self, bind_point: PipelineBindPoint, root_signature: NativeRootSignatureId) {
        self.push(MockCommand::RootSignature(bind_point, root_signature));
    }

    fn set_root_descriptor_table(&mut self, bind_point: PipelineBindPoint, root_index: u32, base: GpuDescriptorHandle) {
        self.push(MockCommand::DescriptorTable {
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
        self.push(MockCommand::RootConstantBuffer(bind_point, root_index, address));
    }

    fn set_root_shader_resource_view(
        &mut self,
        bind_point: PipelineBindPoint,
        root_index: u32,
        address: GpuVirtualAddress,
    ) {
        self.push(MockCommand::RootShaderResource(bind_point, root_index, address));
    }

    fn set_root_constants(&mut self, bind_point: PipelineBindPoint, root_index: u32, values: &[u32], dest_offset: u32) {
        self.push(MockCommand::RootConstants {
            bind_point,
            root_index,
            values: values.to_vec(),
            dest_offset,
        });
    }

    fn set_index_buffer(&mut self, view: &IndexBufferView) {
        self.push(MockCommand::IndexBuffer(*view));
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.push(MockCommand::Topology(topology));
    }

    fn set_descriptor_heaps(&mut self, heaps: &[NativeHeapId]) {
        self.push(MockCommand::DescriptorHeaps(heaps.to_vec()));
    }

    fn set_render_targets(&mut self, render_targets: &[CpuDescriptorHandle], depth_stencil: Option<CpuDescriptorHandle>) {
        self.push(MockCommand::RenderTargets(render_targets.to_vec(), depth_stencil));
    }

    fn clear_render_target_view(&mut self, view: CpuDescriptorHandle, color: [f32; 4]) {
        self.push(MockCommand::ClearRenderTarget(view, color));
    }

    fn clear_depth_stencil_view(&mut self, view: CpuDescriptorHandle, depth: f32, stencil: u8) {
        self.push(MockCommand::ClearDepthStencil(view, depth, stencil));
    }

    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32, _start_vertex: u32, _start_instance: u32) {
        self.push(MockCommand::Draw {
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
        self.push(MockCommand::DrawIndexed {
            index_count,
            instance_count,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.push(MockCommand::Dispatch(x, y, z));
    }

    fn copy_buffer_region(
        &mut self,
        destination: NativeResourceId,
        _destination_offset: u64,
        source: NativeResourceId,
        _source_offset: u64,
        size: u64,
    ) {
        self.push(MockCommand::CopyBuffer {
            destination,
            source,
            size,
        });
    }

    fn resource_barrier(&mut self, barriers: &[TransitionBarrier]) {
        self.push(MockCommand::Barrier(barriers.to_vec()));
    }

    fn begin_event(&mut self, name: &str) {
        self.push(MockCommand::BeginEvent(name.to_string()));
    }

    fn end_event(&mut self) {
        self.push(MockCommand::EndEvent);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A queue that completes work as soon as it is signaled.
#[derive(Debug)]
pub struct MockQueue {
    kind: QueueKind,
}

impl NativeQueue for MockQueue {
    fn kind(&self) -> QueueKind {
        self.kind
    }

    fn execute_command_lists(&self, lists: &mut [&mut dyn NativeCommandList]) -> Result<(), DeviceError> {
        for list in lists.iter() {
            let open = list
                .as_any()
                .downcast_ref::<MockCommandList>()
                .is_none_or(|list| list.open);
            if open {
                return Err(DeviceError::failed(NativeObject::Submission, "list is not closed"));
            }
        }
        Ok(())
    }

    fn signal(&self, fence: &Arc<dyn NativeFence>, value: u64) -> Result<(), DeviceError> {
        fence.signal(value)
    }

    fn wait(&self, _fence: &Arc<dyn NativeFence>, _value: u64) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// A fence that only moves when signaled; blocking on a future value fails.
#[derive(Debug)]
pub struct MockFence {
    completed: AtomicU64,
    blocking_waits: AtomicU32,
}

impl MockFence {
    /// The number of waits that reached the native primitive.
    pub fn blocking_waits(&self) -> u32 {
        self.blocking_waits.load(Ordering::SeqCst)
    }
}

impl NativeFence for MockFence {
    fn completed_value(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    fn wait_for_value(&self, value: u64) -> Result<(), DeviceError> {
        if self.completed_value() >= value {
            return Ok(());
        }
        self.blocking_waits.fetch_add(1, Ordering::SeqCst);
        Err(DeviceError::failed(
            NativeObject::Fence,
            format!("value {value} would never complete"),
        ))
    }

    fn signal(&self, value: u64) -> Result<(), DeviceError> {
        self.completed.fetch_max(value, Ordering::SeqCst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A provider serving generated byte code for any shader unless told otherwise.
#[derive(Debug, Default)]
pub struct MockShaderProvider {
    overrides: Mutex<HashMap<(String, String), Option<Vec<u8>>>>,
    resets: AtomicU32,
}

impl MockShaderProvider {
    /// Makes `name`/`entry_point` unavailable.
    pub fn remove(&self, name: &str, entry_point: &str) {
        lock(&self.overrides).insert((name.to_string(), entry_point.to_string()), None);
    }

    /// Serves `bytes` for `name`/`entry_point`.
    pub fn insert(&self, name: &str, entry_point: &str, bytes: Vec<u8>) {
        lock(&self.overrides).insert((name.to_string(), entry_point.to_string()), Some(bytes));
    }

    /// The number of cache resets.
    pub fn resets(&self) -> u32 {
        self.resets.load(Ordering::SeqCst)
    }
}

impl ShaderProvider for MockShaderProvider {
    fn load(&self, name: &str, entry_point: &str, stage: ShaderStage) -> Result<ShaderBytecode, ShaderError> {
        let key = (name.to_string(), entry_point.to_string());
        match lock(&self.overrides).get(&key) {
            Some(Some(bytes)) => Ok(ShaderBytecode::new(bytes.clone())),
            Some(None) => Err(ShaderError::NotFound {
                name: name.to_string(),
                entry_point: entry_point.to_string(),
                stage,
            }),
            None => Ok(ShaderBytecode::new(
                format!("{name}.{entry_point}.{}", stage.as_str()).into_bytes(),
            )),
        }
    }

    fn reset_cache(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}
