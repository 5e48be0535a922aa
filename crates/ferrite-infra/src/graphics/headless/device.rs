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

use super::command::HeadlessCommandList;
use super::fence::HeadlessFence;
use super::queue::HeadlessQueue;
use super::state::*;
use ferrite_core::renderer::api::*;
use ferrite_core::renderer::error::{DeviceError, NativeObject, STATUS_INVALID_ARG};
use ferrite_core::renderer::traits::{NativeCommandList, NativeFence, NativeQueue, RenderDevice};
use ferrite_core::utils::lock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How long a blocked fence wait lasts before the device is considered hung.
pub const DEFAULT_HANG_TIMEOUT: Duration = Duration::from_secs(10);

/// A software device that executes command lists on CPU worker threads.
///
/// Besides implementing [`RenderDevice`], it exposes what a debug layer would:
/// the actual state of every resource, the content of every descriptor slot,
/// a totally ordered execution log and the list of validation errors.
pub struct HeadlessDevice {
    name: String,
    state: Arc<DeviceState>,
}

impl HeadlessDevice {
    /// Creates a device with the default hang timeout.
    pub fn new() -> Self {
        Self::with_hang_timeout(DEFAULT_HANG_TIMEOUT)
    }

    /// Creates a device whose fence waits give up after `hang_timeout`.
    pub fn with_hang_timeout(hang_timeout: Duration) -> Self {
        log::info!("Created headless device (hang timeout {hang_timeout:?})");
        Self {
            name: "Ferrite Headless Adapter".to_string(),
            state: Arc::new(DeviceState::new(hang_timeout)),
        }
    }

    /// Every event the simulated GPU went through, in execution order.
    pub fn execution_log(&self) -> Vec<ExecutionEvent> {
        self.state.execution_log()
    }

    /// Forgets the execution log.
    pub fn clear_execution_log(&self) {
        self.state.clear_execution_log();
    }

    /// Every validation error reported so far.
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        self.state.validation_errors()
    }

    /// Returns and forgets the validation errors reported so far.
    pub fn take_validation_errors(&self) -> Vec<ValidationError> {
        self.state.take_validation_errors()
    }

    /// The state a resource is actually in on the GPU timeline.
    pub fn actual_state(&self, resource: NativeResourceId) -> Option<ResourceState> {
        lock(&self.state.resources)
            .get(&resource)
            .map(|entry| entry.state)
    }

    /// The contents of a buffer as seen by the GPU timeline.
    pub fn read_buffer(&self, resource: NativeResourceId) -> Option<Vec<u8>> {
        match lock(&self.state.resources).get(&resource).map(|entry| &entry.data) {
            Some(ResourceData::Buffer { size, bytes, .. }) => {
                let mut contents = bytes.clone();
                contents.resize(*size as usize, 0);
                Some(contents)
            }
            _ => None,
        }
    }

    /// The extent and format of a texture.
    pub fn texture_info(&self, resource: NativeResourceId) -> Option<(u32, u32, Format)> {
        match lock(&self.state.resources).get(&resource).map(|entry| &entry.data) {
            Some(ResourceData::Texture {
                width,
                height,
                format,
            }) => Some((*width, *height, *format)),
            _ => None,
        }
    }

    /// What the descriptor at a CPU handle describes.
    pub fn descriptor(&self, handle: CpuDescriptorHandle) -> Option<DescriptorContent> {
        self.state.descriptor(handle.0)
    }

    /// What the descriptor at a GPU handle describes.
    pub fn gpu_descriptor(&self, handle: GpuDescriptorHandle) -> Option<DescriptorContent> {
        self.state.descriptor(handle.0)
    }

    /// The number of live buffers and textures.
    pub fn live_resources(&self) -> usize {
        lock(&self.state.resources).len()
    }

    /// The number of live pipeline state objects.
    pub fn live_pipelines(&self) -> usize {
        lock(&self.state.pipelines).len()
    }

    /// The number of live descriptor heaps.
    pub fn live_heaps(&self) -> usize {
        lock(&self.state.heaps).len()
    }

    pub(crate) fn shared_state(&self) -> &Arc<DeviceState> {
        &self.state
    }

    fn insert_resource(&self, label: Option<&str>, state: ResourceState, data: ResourceData) -> NativeResourceId {
        let id = NativeResourceId(self.state.next_id());
        let label = label.map_or_else(|| format!("resource {}", id.0), str::to_string);
        log::trace!("Created {label} ({id:?}) in {state:?}");
        lock(&self.state.resources).insert(id, ResourceEntry { label, state, data });
        id
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HeadlessDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessDevice")
            .field("name", &self.name)
            .field("resources", &self.live_resources())
            .field("pipelines", &self.live_pipelines())
            .finish()
    }
}

impl RenderDevice for HeadlessDevice {
    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: self.name.clone(),
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
        if capacity == 0 {
            return Err(DeviceError::new(
                NativeObject::DescriptorHeap,
                STATUS_INVALID_ARG,
                "descriptor heaps need at least one slot",
            ));
        }
        if shader_visible && !heap_type.can_be_shader_visible() {
            return Err(DeviceError::new(
                NativeObject::DescriptorHeap,
                STATUS_INVALID_ARG,
                format!("{heap_type:?} heaps cannot be shader visible"),
            ));
        }

        let id = NativeHeapId(self.state.next_id());
        let base = id.0 << HEAP_SHIFT;
        let heap = NativeDescriptorHeap {
            id,
            heap_type,
            capacity,
            increment: DESCRIPTOR_INCREMENT,
            cpu_start: CpuDescriptorHandle(base),
            gpu_start: shader_visible.then_some(GpuDescriptorHandle(base)),
        };
        lock(&self.state.heaps).insert(
            id,
            HeapEntry {
                heap,
                slots: vec![None; capacity as usize],
            },
        );
        log::debug!("Created {heap_type:?} heap {id:?} with {capacity} slot(s), shader visible: {shader_visible}");
        Ok(heap)
    }

    fn destroy_descriptor_heap(&self, id: NativeHeapId) {
        lock(&self.state.heaps).remove(&id);
    }

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_state: ResourceState,
    ) -> Result<NativeResourceId, DeviceError> {
        if descriptor.size == 0 {
            return Err(DeviceError::new(
                NativeObject::Resource,
                STATUS_INVALID_ARG,
                "buffers cannot be empty",
            ));
        }
        Ok(self.insert_resource(
            descriptor.label.as_deref(),
            initial_state,
            ResourceData::Buffer {
                size: descriptor.size,
                heap: descriptor.heap,
                bytes: Vec::new(),
            },
        ))
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        initial_state: ResourceState,
    ) -> Result<NativeResourceId, DeviceError> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(DeviceError::new(
                NativeObject::Resource,
                STATUS_INVALID_ARG,
                "textures cannot be empty",
            ));
        }
        Ok(self.insert_resource(
            descriptor.label.as_deref(),
            initial_state,
            ResourceData::Texture {
                width: descriptor.width,
                height: descriptor.height,
                format: descriptor.format,
            },
        ))
    }

    fn destroy_resource(&self, id: NativeResourceId) {
        if let Some(entry) = lock(&self.state.resources).remove(&id) {
            log::trace!("Destroyed {} ({id:?})", entry.label);
        }
    }

    fn gpu_virtual_address(&self, id: NativeResourceId) -> GpuVirtualAddress {
        match lock(&self.state.resources).get(&id).map(|entry| &entry.data) {
            Some(ResourceData::Buffer { .. }) => GpuVirtualAddress(id.0 << 32),
            _ => GpuVirtualAddress(0),
        }
    }

    fn write_buffer(&self, id: NativeResourceId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let mut resources = lock(&self.state.resources);
        let Some(entry) = resources.get_mut(&id) else {
            return Err(DeviceError::new(
                NativeObject::Resource,
                STATUS_INVALID_ARG,
                format!("{id:?} does not exist"),
            ));
        };
        match &mut entry.data {
            ResourceData::Buffer { size, heap, bytes } if heap.is_cpu_writable() => {
                let end = offset + data.len() as u64;
                if end > *size {
                    return Err(DeviceError::new(
                        NativeObject::Resource,
                        STATUS_INVALID_ARG,
                        format!("write of {} byte(s) at {offset} overflows {}", data.len(), entry.label),
                    ));
                }
                if bytes.len() < end as usize {
                    bytes.resize(end as usize, 0);
                }
                bytes[offset as usize..end as usize].copy_from_slice(data);
                Ok(())
            }
            _ => Err(DeviceError::new(
                NativeObject::Resource,
                STATUS_INVALID_ARG,
                format!("{} is not CPU writable", entry.label),
            )),
        }
    }

    fn create_view(&self, resource: NativeResourceId, descriptor: &ViewDesc, destination: CpuDescriptorHandle) {
        let kind = descriptor.kind();
        if !lock(&self.state.resources).contains_key(&resource) {
            log::warn!("{kind:?} view created for missing {resource:?}");
        }
        let (heap, index) = DeviceState::locate(destination.0);
        let mut heaps = lock(&self.state.heaps);
        match heaps.get_mut(&heap).and_then(|entry| {
            (entry.heap.heap_type == kind.heap_type())
                .then_some(entry.slots.get_mut(index))
                .flatten()
        }) {
            Some(slot) => *slot = Some(DescriptorContent { resource, kind }),
            None => {
                drop(heaps);
                self.state.report(ValidationError::UnknownDescriptor {
                    handle: destination.0,
                });
            }
        }
    }

    fn copy_descriptors_simple(
        &self,
        count: u32,
        destination: CpuDescriptorHandle,
        source: CpuDescriptorHandle,
        _heap_type: DescriptorHeapType,
    ) {
        let mut heaps = lock(&self.state.heaps);
        for index in 0..count {
            let from = source.offset(index, DESCRIPTOR_INCREMENT).0;
            let to = destination.offset(index, DESCRIPTOR_INCREMENT).0;
            let (source_heap, source_index) = DeviceState::locate(from);
            let (target_heap, target_index) = DeviceState::locate(to);

            let content = heaps
                .get(&source_heap)
                .and_then(|entry| entry.slots.get(source_index).copied());
            let target = heaps
                .get_mut(&target_heap)
                .and_then(|entry| entry.slots.get_mut(target_index));
            match (content, target) {
                (Some(content), Some(target)) => *target = content,
                (None, _) => self
                    .state
                    .report(ValidationError::UnknownDescriptor { handle: from }),
                (_, None) => self
                    .state
                    .report(ValidationError::UnknownDescriptor { handle: to }),
            }
        }
    }

    fn create_root_signature(&self, descriptor: &RootSignatureDesc) -> Result<NativeRootSignatureId, DeviceError> {
        if let Some((root_index, _)) = descriptor.descriptor_tables().find(|(_, size)| *size == 0) {
            return Err(DeviceError::new(
                NativeObject::RootSignature,
                STATUS_INVALID_ARG,
                format!("descriptor table at root parameter {root_index} is empty"),
            ));
        }
        let id = NativeRootSignatureId(self.state.next_id());
        lock(&self.state.root_signatures).insert(id, descriptor.parameters.len());
        Ok(id)
    }

    fn destroy_root_signature(&self, id: NativeRootSignatureId) {
        lock(&self.state.root_signatures).remove(&id);
    }

    fn create_graphics_pipeline(&self, descriptor: &NativeGraphicsPipelineDesc) -> Result<NativePipelineId, DeviceError> {
        if descriptor.vertex.is_empty() || descriptor.pixel.is_some_and(|pixel| pixel.is_empty()) {
            return Err(DeviceError::new(
                NativeObject::PipelineState,
                STATUS_INVALID_ARG,
                format!("pipeline '{}' has empty byte code", descriptor.label),
            ));
        }
        self.insert_pipeline(descriptor.label, descriptor.root_signature, false)
    }

    fn create_compute_pipeline(&self, descriptor: &NativeComputePipelineDesc) -> Result<NativePipelineId, DeviceError> {
        if descriptor.shader.is_empty() {
            return Err(DeviceError::new(
                NativeObject::PipelineState,
                STATUS_INVALID_ARG,
                format!("pipeline '{}' has empty byte code", descriptor.label),
            ));
        }
        self.insert_pipeline(descriptor.label, descriptor.root_signature, true)
    }

    fn destroy_pipeline(&self, id: NativePipelineId) {
        lock(&self.state.pipelines).remove(&id);
    }

    fn create_command_queue(&self, kind: QueueKind, label: &str) -> Result<Box<dyn NativeQueue>, DeviceError> {
        Ok(Box::new(HeadlessQueue::spawn(kind, label, self.state.clone())?))
    }

    fn create_command_list(&self, kind: QueueKind, label: &str) -> Result<Box<dyn NativeCommandList>, DeviceError> {
        Ok(Box::new(HeadlessCommandList::new(kind, label, self.state.clone())))
    }

    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn NativeFence>, DeviceError> {
        Ok(Arc::new(HeadlessFence::new(initial_value, self.state.hang_timeout)))
    }
}

impl HeadlessDevice {
    fn insert_pipeline(
        &self,
        label: &str,
        root_signature: NativeRootSignatureId,
        compute: bool,
    ) -> Result<NativePipelineId, DeviceError> {
        if !lock(&self.state.root_signatures).contains_key(&root_signature) {
            return Err(DeviceError::new(
                NativeObject::PipelineState,
                STATUS_INVALID_ARG,
                format!("pipeline '{label}' references unknown {root_signature:?}"),
            ));
        }
        let id = NativePipelineId(self.state.next_id());
        lock(&self.state.pipelines).insert(
            id,
            PipelineEntry {
                root_signature,
                compute,
            },
        );
        log::trace!("Created pipeline '{label}' ({id:?})");
        Ok(id)
    }
}
