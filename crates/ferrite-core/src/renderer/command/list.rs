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

//! The command list recorder.
//!
//! Most operations are thin wrappers that translate engine-level arguments into
//! native calls. The two pieces of real logic are the resource barrier policy
//! and the cache of the bound pipeline and root signature.

use super::stats::CommandListStats;
use crate::renderer::api::*;
use crate::renderer::descriptor::{DynamicGpuHeap, ResourceDescriptor};
use crate::renderer::error::{CommandError, DeviceError};
use crate::renderer::pipeline::{RootSignature, RootSignatureId, Technique, TechniqueId};
use crate::renderer::resource::GpuResource;
use crate::renderer::traits::NativeCommandList;
use std::fmt;
use std::sync::Weak;

/// The recording state of a [`CommandList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    /// The list accepts commands.
    Recording,
    /// The list is closed and may be executed.
    Closed,
}

/// A recorder of GPU commands wrapping one native command list.
///
/// Lists start closed. [`CommandList::reset`] opens them for recording and clears
/// the pipeline and root signature cache; [`CommandList::close`] (issued by the
/// owning queue on execution) closes them again.
pub struct CommandList {
    label: String,
    native: Box<dyn NativeCommandList>,
    state: ListState,
    bind_point: PipelineBindPoint,
    pipeline: Option<NativePipelineId>,
    technique: Option<TechniqueId>,
    graphics_root: Option<(RootSignatureId, NativeRootSignatureId)>,
    compute_root: Option<(RootSignatureId, NativeRootSignatureId)>,
    open_events: u32,
    stats: CommandListStats,
    // Tracked states replaced by the barriers of the current recording epoch.
    transitions: Vec<(Weak<GpuResource>, ResourceState)>,
}

impl CommandList {
    /// Wraps a closed native command list.
    pub fn new(label: impl Into<String>, native: Box<dyn NativeCommandList>) -> Self {
        Self {
            label: label.into(),
            native,
            state: ListState::Closed,
            bind_point: PipelineBindPoint::Graphics,
            pipeline: None,
            technique: None,
            graphics_root: None,
            compute_root: None,
            open_events: 0,
            stats: CommandListStats::default(),
            transitions: Vec::new(),
        }
    }

    /// The debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The kind of queue the list can be executed on.
    pub fn kind(&self) -> QueueKind {
        self.native.kind()
    }

    /// The recording state.
    pub fn state(&self) -> ListState {
        self.state
    }

    /// Returns `true` while the list accepts commands.
    pub fn is_recording(&self) -> bool {
        self.state == ListState::Recording
    }

    /// The counters of the current recording epoch.
    pub fn stats(&self) -> CommandListStats {
        self.stats
    }

    /// The native list.
    pub fn native(&self) -> &dyn NativeCommandList {
        self.native.as_ref()
    }

    /// The native list, mutably.
    pub fn native_mut(&mut self) -> &mut dyn NativeCommandList {
        self.native.as_mut()
    }

    /// Resets the allocator and reopens the list.
    ///
    /// Clears the pipeline and root signature cache and the statistics.
    pub fn reset(&mut self) -> Result<(), DeviceError> {
        self.native.reset()?;
        self.state = ListState::Recording;
        self.bind_point = PipelineBindPoint::Graphics;
        self.pipeline = None;
        self.technique = None;
        self.graphics_root = None;
        self.compute_root = None;
        self.open_events = 0;
        self.stats = CommandListStats::default();
        self.transitions.clear();
        Ok(())
    }

    /// Closes the list.
    ///
    /// Debug marker sections still open are closed first.
    pub fn close(&mut self) -> Result<(), CommandError> {
        if !self.is_recording() {
            return Err(CommandError::NotRecording {
                label: self.label.clone(),
            });
        }
        if self.open_events > 0 {
            log::warn!(
                "Command list '{}' closed with {} debug marker section(s) still open",
                self.label,
                self.open_events
            );
            while self.open_events > 0 {
                self.end_event();
            }
        }
        self.native.close()?;
        self.state = ListState::Closed;
        self.transitions.clear();
        Ok(())
    }

    /// Closes the list for good without it ever being executed.
    ///
    /// The barriers recorded since the last reset never reach the GPU, so the
    /// tracked state of every resource they moved is put back, newest first.
    /// ## Errors
    /// * `CommandError::NotRecording` - If the list is already closed.
    pub fn discard(&mut self) -> Result<(), CommandError> {
        if !self.is_recording() {
            return Err(CommandError::NotRecording {
                label: self.label.clone(),
            });
        }
        let mut restored = 0;
        for (resource, before) in self.transitions.drain(..).rev() {
            if let Some(resource) = resource.upgrade() {
                resource.restore_state(before);
                restored += 1;
            }
        }
        if restored > 0 {
            log::debug!(
                "[{}] discarded with {restored} barrier(s); tracked states restored",
                self.label
            );
        }
        self.close()
    }

    fn debug_check_recording(&self, operation: &str) {
        debug_assert!(
            self.is_recording(),
            "'{operation}' recorded into closed command list '{}'",
            self.label
        );
    }

    /// Sets a single viewport.
    pub fn set_viewport(&mut self, viewport: &Viewport) {
        self.debug_check_recording("set_viewport");
        self.native.set_viewports(std::slice::from_ref(viewport));
    }

    /// Sets a single scissor rectangle.
    pub fn set_scissor_rect(&mut self, rect: &ScissorRect) {
        self.debug_check_recording("set_scissor_rect");
        self.native.set_scissor_rects(std::slice::from_ref(rect));
    }

    /// Binds a pipeline state object, skipping the call if it is already bound.
    pub fn set_pipeline_state(&mut self, pipeline: NativePipelineId) {
        self.debug_check_recording("set_pipeline_state");
        if self.pipeline == Some(pipeline) {
            return;
        }
        self.native.set_pipeline_state(pipeline);
        self.pipeline = Some(pipeline);
        self.technique = None;
        self.stats.pipeline_changes += 1;
    }

    fn set_root_signature(&mut self, bind_point: PipelineBindPoint, root_signature: &RootSignature) {
        self.debug_check_recording("set_root_signature");
        let entry = Some((root_signature.id(), root_signature.native()));
        let cached = match bind_point {
            PipelineBindPoint::Graphics => &mut self.graphics_root,
            PipelineBindPoint::Compute => &mut self.compute_root,
        };
        if *cached != entry {
            *cached = entry;
            self.native.set_root_signature(bind_point, root_signature.native());
        }
    }

    /// Binds the graphics root signature, skipping the call if it is already bound.
    pub fn set_graphics_root_signature(&mut self, root_signature: &RootSignature) {
        self.set_root_signature(PipelineBindPoint::Graphics, root_signature);
    }

    /// Binds the compute root signature, skipping the call if it is already bound.
    pub fn set_compute_root_signature(&mut self, root_signature: &RootSignature) {
        self.set_root_signature(PipelineBindPoint::Compute, root_signature);
    }

    /// Binds a technique: its root signature on the technique's bind point and its
    /// pipeline state object.
    ///
    /// Subsequent root arguments and descriptor table commits target that bind point.
    pub fn set_technique(&mut self, technique: &Technique, root_signature: &RootSignature) {
        debug_assert_eq!(technique.root_signature(), root_signature.id());
        self.bind_point = technique.bind_point();
        self.set_root_signature(self.bind_point, root_signature);
        self.set_pipeline_state(technique.pipeline());
        self.technique = Some(technique.id());
    }

    /// The technique bound by the last [`CommandList::set_technique`], if its
    /// pipeline is still the bound one.
    pub fn bound_technique(&self) -> Option<TechniqueId> {
        self.technique
    }

    /// The bound pipeline state object.
    pub fn bound_pipeline(&self) -> Option<NativePipelineId> {
        self.pipeline
    }

    /// The root signature bound on `bind_point`.
    pub fn bound_root_signature(&self, bind_point: PipelineBindPoint) -> Option<RootSignatureId> {
        match bind_point {
            PipelineBindPoint::Graphics => self.graphics_root.map(|(id, _)| id),
            PipelineBindPoint::Compute => self.compute_root.map(|(id, _)| id),
        }
    }

    /// The bind point of the last bound technique; graphics by default.
    pub fn bind_point(&self) -> PipelineBindPoint {
        self.bind_point
    }

    /// Binds a descriptor table to a root parameter.
    pub fn set_root_descriptor_table(
        &mut self,
        bind_point: PipelineBindPoint,
        root_index: u32,
        base: GpuDescriptorHandle,
    ) {
        self.debug_check_recording("set_root_descriptor_table");
        self.native.set_root_descriptor_table(bind_point, root_index, base);
    }

    /// Binds a buffer as a root constant buffer.
    pub fn set_root_constant_buffer(
        &mut self,
        bind_point: PipelineBindPoint,
        root_index: u32,
        buffer: &GpuResource,
    ) {
        self.set_root_constant_buffer_address(bind_point, root_index, buffer.gpu_virtual_address());
    }

    /// Binds a constant buffer address to a root parameter.
    pub fn set_root_constant_buffer_address(
        &mut self,
        bind_point: PipelineBindPoint,
        root_index: u32,
        address: GpuVirtualAddress,
    ) {
        self.debug_check_recording("set_root_constant_buffer");
        self.native
            .set_root_constant_buffer_view(bind_point, root_index, address);
    }

    /// Binds a buffer as a root shader resource.
    pub fn set_root_shader_resource(
        &mut self,
        bind_point: PipelineBindPoint,
        root_index: u32,
        buffer: &GpuResource,
    ) {
        self.debug_check_recording("set_root_shader_resource");
        self.native.set_root_shader_resource_view(
            bind_point,
            root_index,
            buffer.gpu_virtual_address(),
        );
    }

    /// Writes any plain value as inline root constants.
    ///
    /// The value is split into 32-bit words; a trailing partial word is zero padded.
    pub fn set_root_constants<T: bytemuck::Pod>(
        &mut self,
        bind_point: PipelineBindPoint,
        root_index: u32,
        value: &T,
    ) {
        self.debug_check_recording("set_root_constants");
        let words: Vec<u32> = bytemuck::bytes_of(value)
            .chunks(4)
            .map(|chunk| {
                let mut word = [0u8; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                u32::from_ne_bytes(word)
            })
            .collect();
        self.native
            .set_root_constants(bind_point, root_index, &words, 0);
    }

    /// Writes inline root constants on the graphics root.
    pub fn set_graphics_root_constants<T: bytemuck::Pod>(&mut self, root_index: u32, value: &T) {
        self.set_root_constants(PipelineBindPoint::Graphics, root_index, value);
    }

    /// Writes inline root constants on the compute root.
    pub fn set_compute_root_constants<T: bytemuck::Pod>(&mut self, root_index: u32, value: &T) {
        self.set_root_constants(PipelineBindPoint::Compute, root_index, value);
    }

    /// Binds an index buffer.
    pub fn set_index_buffer(&mut self, view: &IndexBufferView) {
        self.debug_check_recording("set_index_buffer");
        self.native.set_index_buffer(view);
    }

    /// Sets the primitive topology for subsequent draws.
    pub fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.debug_check_recording("set_primitive_topology");
        self.native.set_primitive_topology(topology);
    }

    /// Binds the shader-visible heap of a ring slot.
    pub fn set_descriptor_heap(&mut self, heap: &DynamicGpuHeap) {
        self.debug_check_recording("set_descriptor_heap");
        self.native.set_descriptor_heaps(&[heap.native_heap()]);
    }

    /// Binds color attachments and an optional depth attachment.
    pub fn set_render_targets(
        &mut self,
        render_targets: &[&ResourceDescriptor],
        depth_stencil: Option<&ResourceDescriptor>,
    ) {
        self.debug_check_recording("set_render_targets");
        debug_assert!(render_targets.iter().all(|view| view.kind() == ViewKind::Rtv));
        debug_assert!(depth_stencil.is_none_or(|view| view.kind() == ViewKind::Dsv));
        let handles: Vec<_> = render_targets.iter().map(|view| view.cpu_handle()).collect();
        self.native
            .set_render_targets(&handles, depth_stencil.map(ResourceDescriptor::cpu_handle));
    }

    /// Clears a render target view.
    pub fn clear_render_target(&mut self, view: &ResourceDescriptor, color: [f32; 4]) {
        self.debug_check_recording("clear_render_target");
        self.native.clear_render_target_view(view.cpu_handle(), color);
    }

    /// Clears a depth-stencil view.
    pub fn clear_depth_stencil(&mut self, view: &ResourceDescriptor, depth: f32, stencil: u8) {
        self.debug_check_recording("clear_depth_stencil");
        self.native
            .clear_depth_stencil_view(view.cpu_handle(), depth, stencil);
    }

    /// Draws non-indexed, instanced primitives.
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, start_vertex: u32, start_instance: u32) {
        self.debug_check_recording("draw");
        self.native
            .draw_instanced(vertex_count, instance_count, start_vertex, start_instance);
        self.stats.draws += 1;
    }

    /// Draws indexed, instanced primitives.
    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        self.debug_check_recording("draw_indexed");
        self.native.draw_indexed_instanced(
            index_count,
            instance_count,
            start_index,
            base_vertex,
            start_instance,
        );
        self.stats.draws += 1;
    }

    /// Dispatches compute thread groups.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.debug_check_recording("dispatch");
        self.native.dispatch(x, y, z);
        self.stats.dispatches += 1;
    }

    /// Copies `size` bytes between two buffers.
    ///
    /// Both buffers must already be in the copy states; use
    /// [`CommandList::resource_barriers`] first.
    pub fn copy_buffer_region(
        &mut self,
        destination: &GpuResource,
        destination_offset: u64,
        source: &GpuResource,
        source_offset: u64,
        size: u64,
    ) {
        self.debug_check_recording("copy_buffer_region");
        debug_assert_eq!(destination.state(), ResourceState::CopyDest);
        self.native.copy_buffer_region(
            destination.native(),
            destination_offset,
            source.native(),
            source_offset,
            size,
        );
    }

    /// Transitions one resource to `target`.
    ///
    /// Emits exactly one barrier if the tracked state differs from `target` and
    /// updates the tracked state; does nothing otherwise. Returns whether a
    /// barrier was emitted.
    pub fn resource_barrier(&mut self, resource: &GpuResource, target: ResourceState) -> bool {
        self.resource_barriers(&[(resource, target)]) == 1
    }

    /// Transitions several resources, coalescing every needed transition into a
    /// single native barrier call.
    ///
    /// A resource listed twice transitions from the state left by its previous
    /// entry. Returns the number of emitted barriers.
    pub fn resource_barriers(&mut self, transitions: &[(&GpuResource, ResourceState)]) -> usize {
        self.debug_check_recording("resource_barrier");
        let mut barriers = Vec::with_capacity(transitions.len());
        for (resource, target) in transitions {
            if let Some(barrier) = resource.transition_to(*target) {
                self.transitions.push((resource.downgrade(), barrier.before));
                barriers.push(barrier);
            }
        }

        let redundant = transitions.len() - barriers.len();
        self.stats.redundant_barriers += redundant as u32;
        if barriers.is_empty() {
            return 0;
        }

        for barrier in &barriers {
            log::trace!(
                "[{}] barrier {:?}: {:?} -> {:?}",
                self.label,
                barrier.resource,
                barrier.before,
                barrier.after
            );
        }
        self.native.resource_barrier(&barriers);
        self.stats.barriers += barriers.len() as u32;
        self.stats.barrier_calls += 1;
        barriers.len()
    }

    /// Opens a named debug marker section.
    pub fn begin_event(&mut self, name: &str) {
        self.debug_check_recording("begin_event");
        self.native.begin_event(name);
        self.open_events += 1;
    }

    /// Closes the innermost debug marker section. Unbalanced calls are ignored.
    pub fn end_event(&mut self) {
        if self.open_events == 0 {
            log::warn!("Unbalanced end_event on command list '{}'", self.label);
            return;
        }
        self.native.end_event();
        self.open_events -= 1;
    }

    /// Records `record` inside a named debug marker section.
    pub fn debug_scope<R>(&mut self, name: &str, record: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_event(name);
        let result = record(self);
        self.end_event();
        result
    }

    pub(crate) fn add_descriptor_copies(&mut self, copies: u32) {
        self.stats.descriptor_copies += copies;
    }
}

impl fmt::Debug for CommandList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandList")
            .field("label", &self.label)
            .field("state", &self.state)
            .field("bind_point", &self.bind_point)
            .field("pipeline", &self.pipeline)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCommand, MockDevice};
    use crate::renderer::traits::RenderDevice;
    use std::sync::Arc;

    fn open_list(device: &Arc<dyn RenderDevice>) -> CommandList {
        let native = device
            .create_command_list(QueueKind::Graphics, "test")
            .expect("list is created");
        let mut list = CommandList::new("test", native);
        list.reset().expect("reset succeeds");
        list
    }

    fn buffer(device: &Arc<dyn RenderDevice>, state: ResourceState) -> Arc<GpuResource> {
        GpuResource::create_buffer(
            device,
            &BufferDescriptor {
                size: 256,
                ..Default::default()
            },
            state,
        )
        .expect("buffer is created")
    }

    #[test]
    fn barrier_to_current_state_is_a_no_op() {
        let (_, device) = MockDevice::shared();
        let mut list = open_list(&device);
        let resource = buffer(&device, ResourceState::Common);

        assert!(list.resource_barrier(&resource, ResourceState::CopyDest));
        assert!(!list.resource_barrier(&resource, ResourceState::CopyDest));
        assert_eq!(resource.state(), ResourceState::CopyDest);

        let stats = list.stats();
        assert_eq!(stats.barriers, 1);
        assert_eq!(stats.redundant_barriers, 1);
        assert_eq!(MockCommand::barriers(&list).len(), 1);
    }

    #[test]
    fn copy_dest_round_trip_emits_exactly_two_barriers() {
        let (_, device) = MockDevice::shared();
        let mut list = open_list(&device);
        let resource = buffer(&device, ResourceState::CopyDest);

        list.resource_barrier(&resource, ResourceState::GenericRead);
        list.resource_barrier(&resource, ResourceState::CopyDest);

        let emitted = MockCommand::barriers(&list);
        assert_eq!(
            emitted,
            vec![
                TransitionBarrier {
                    resource: resource.native(),
                    before: ResourceState::CopyDest,
                    after: ResourceState::GenericRead,
                },
                TransitionBarrier {
                    resource: resource.native(),
                    before: ResourceState::GenericRead,
                    after: ResourceState::CopyDest,
                },
            ]
        );
    }

    #[test]
    fn batched_barriers_use_a_single_native_call() {
        let (_, device) = MockDevice::shared();
        let mut list = open_list(&device);
        let a = buffer(&device, ResourceState::Common);
        let b = buffer(&device, ResourceState::CopySource);
        let c = buffer(&device, ResourceState::UnorderedAccess);

        let emitted = list.resource_barriers(&[
            (&a, ResourceState::CopyDest),
            (&b, ResourceState::CopySource),
            (&c, ResourceState::NonPixelShaderResource),
        ]);

        assert_eq!(emitted, 2);
        assert_eq!(list.stats().barrier_calls, 1);
        let calls = MockCommand::recorded(&list)
            .into_iter()
            .filter(|command| matches!(command, MockCommand::Barrier(_)))
            .count();
        assert_eq!(calls, 1);
    }

    #[test]
    fn pipeline_and_root_signature_binds_are_cached() {
        let (_, device) = MockDevice::shared();
        let mut list = open_list(&device);

        list.set_pipeline_state(NativePipelineId(7));
        list.set_pipeline_state(NativePipelineId(7));
        list.set_pipeline_state(NativePipelineId(8));
        assert_eq!(list.stats().pipeline_changes, 2);

        list.reset().expect("reset succeeds");
        assert_eq!(list.bound_pipeline(), None);
        list.set_pipeline_state(NativePipelineId(8));
        assert_eq!(list.stats().pipeline_changes, 1);
    }

    #[test]
    fn close_requires_recording() {
        let (_, device) = MockDevice::shared();
        let mut list = open_list(&device);
        list.close().expect("list was recording");
        assert_eq!(list.state(), ListState::Closed);
        assert!(matches!(
            list.close(),
            Err(CommandError::NotRecording { .. })
        ));
    }

    #[test]
    fn discard_restores_tracked_states_newest_first() {
        let (_, device) = MockDevice::shared();
        let mut list = open_list(&device);
        let first = buffer(&device, ResourceState::Common);
        let second = buffer(&device, ResourceState::CopyDest);

        list.resource_barrier(&first, ResourceState::UnorderedAccess);
        list.resource_barrier(&first, ResourceState::NonPixelShaderResource);
        list.resource_barriers(&[
            (&second, ResourceState::GenericRead),
            (&first, ResourceState::NonPixelShaderResource),
        ]);

        list.discard().expect("list was recording");

        assert_eq!(list.state(), ListState::Closed);
        assert_eq!(first.state(), ResourceState::Common);
        assert_eq!(second.state(), ResourceState::CopyDest);
        assert!(matches!(list.discard(), Err(CommandError::NotRecording { .. })));
    }

    #[test]
    fn closed_lists_keep_their_transitions() {
        let (_, device) = MockDevice::shared();
        let mut list = open_list(&device);
        let resource = buffer(&device, ResourceState::Common);

        list.resource_barrier(&resource, ResourceState::CopyDest);
        list.close().expect("list was recording");
        list.reset().expect("reset succeeds");
        list.discard().expect("list was recording");

        assert_eq!(resource.state(), ResourceState::CopyDest);
    }

    #[test]
    fn debug_scope_pairs_markers() {
        let (_, device) = MockDevice::shared();
        let mut list = open_list(&device);
        let draws = list.debug_scope("Opaque", |list| {
            list.draw(3, 1, 0, 0);
            list.stats().draws
        });
        assert_eq!(draws, 1);

        list.begin_event("Left open");
        list.close().expect("close ends open sections");
        let recorded = MockCommand::recorded(&list);
        let begins = recorded
            .iter()
            .filter(|command| matches!(command, MockCommand::BeginEvent(_)))
            .count();
        let ends = recorded
            .iter()
            .filter(|command| matches!(command, MockCommand::EndEvent))
            .count();
        assert_eq!(begins, ends);
    }

    #[test]
    fn root_constants_are_split_into_words() {
        let (_, device) = MockDevice::shared();
        let mut list = open_list(&device);
        list.set_graphics_root_constants(2, &[1.0f32, 2.0, 3.0]);

        let constants = MockCommand::recorded(&list)
            .into_iter()
            .find_map(|command| match command {
                MockCommand::RootConstants { root_index, values, .. } => Some((root_index, values)),
                _ => None,
            })
            .expect("constants were recorded");
        assert_eq!(constants.0, 2);
        assert_eq!(
            constants.1,
            vec![1.0f32.to_bits(), 2.0f32.to_bits(), 3.0f32.to_bits()]
        );
    }
}
