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

//! The per-frame orchestrator.
//!
//! A frame goes through three calls:
//!
//! 1. [`Backend::run_compute`] (optional) records work on the compute queue and
//!    makes the graphics queue wait for it on the GPU.
//! 2. [`Backend::begin_frame`] waits until the current back buffer's previous
//!    frame has completed, opens the next graphics ring slot and returns a
//!    [`Frame`] pre-bound to the viewport, the scissor rectangle and the back
//!    buffer in its render target state.
//! 3. [`Backend::present`] transitions the back buffer back to the present
//!    state, submits the list, signals the frame's fence value and presents.
//!
//! A shader rebuild requested with [`Backend::request_shader_rebuild`] is
//! applied at the next frame boundary, after every queue has been flushed.

use crate::catalog::{BuiltinCatalog, BuiltinTechniques};
use crate::config::BackendConfig;
use anyhow::{bail, Context};
use ferrite_core::renderer::api::*;
use ferrite_core::renderer::command::{
    CommandList, CommandListStats, CommandQueue, SlotRecorder, SlotState,
};
use ferrite_core::renderer::descriptor::{DescriptorHeapCollection, DynamicGpuHeap, ResourceDescriptor};
use ferrite_core::renderer::error::{CommandError, HeapError, RenderError, TechniqueError};
use ferrite_core::renderer::pipeline::{TechniqueId, Techniques};
use ferrite_core::renderer::resource::GpuResource;
use ferrite_core::renderer::traits::{PresentStatus, RenderDevice, ShaderProvider, SwapChain};
use ferrite_infra::{HeadlessDevice, HeadlessSwapChain, HeadlessSwapChainDesc};
use std::fmt;
use std::sync::Arc;

/// Presents wait for one vertical blank.
const PRESENT_SYNC_INTERVAL: u32 = 1;

/// The statistics of one presented frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// The number of the frame, starting at 0.
    pub frame: u64,
    /// The back buffer the frame rendered into.
    pub back_buffer: usize,
    /// The graphics fence value that marks the frame as complete.
    pub fence_value: u64,
    /// The graphics list of the frame.
    pub graphics: CommandListStats,
    /// Every compute submission recorded since the previous frame.
    pub compute: CommandListStats,
    /// The number of compute submissions recorded since the previous frame.
    pub compute_submissions: u32,
}

impl FrameStats {
    /// The graphics and compute statistics added together.
    pub fn total(&self) -> CommandListStats {
        let mut total = self.graphics;
        total += self.compute;
        total
    }
}

/// Ties the device, the swap chain, the descriptor pools, the technique
/// registry and the command queues into a frame loop.
pub struct Backend {
    config: BackendConfig,
    device: Arc<dyn RenderDevice>,
    heaps: Arc<DescriptorHeapCollection>,
    techniques: Techniques,
    builtin: BuiltinTechniques,
    graphics: CommandQueue,
    compute: Option<CommandQueue>,
    swap_chain: Box<dyn SwapChain>,
    render_targets: Vec<Arc<ResourceDescriptor>>,
    depth_target: Arc<ResourceDescriptor>,
    frame_fence_values: Vec<u64>,
    render_mode: u32,
    rebuild_requested: bool,
    last_rebuild_error: Option<TechniqueError>,
    frame_index: u64,
    pending: FrameStats,
    last_frame: Option<FrameStats>,
}

impl Backend {
    /// Builds the backend on top of an existing device and swap chain.
    ///
    /// Creates the descriptor pools, registers the built-in techniques, creates
    /// the graphics queue (and the compute queue if enabled) and the views of
    /// the swap chain's buffers.
    /// ## Errors
    /// Fails if the configuration is invalid or does not match the swap chain,
    /// or if any native object or built-in technique cannot be created.
    pub fn new(
        device: Arc<dyn RenderDevice>,
        swap_chain: Box<dyn SwapChain>,
        shaders: Arc<dyn ShaderProvider>,
        config: BackendConfig,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        if swap_chain.back_buffer_count() != config.back_buffer_count {
            bail!(
                "the swap chain has {} back buffers but the configuration asks for {}",
                swap_chain.back_buffer_count(),
                config.back_buffer_count
            );
        }

        let heaps = Arc::new(
            DescriptorHeapCollection::new(&device, config.pool_sizes())
                .context("failed to create the descriptor pools")?,
        );

        let catalog = BuiltinCatalog::new(swap_chain.format(), swap_chain.depth_format());
        let builtin = catalog.ids();
        if builtin.render_mode(config.initial_render_mode).is_none() {
            bail!("unknown initial render mode {}", config.initial_render_mode);
        }
        let mut techniques = Techniques::new(device.clone(), shaders);
        techniques
            .on_init(catalog.catalog())
            .context("failed to build the built-in techniques")?;

        let graphics = CommandQueue::new(&device, config.queue_desc("Graphics", QueueKind::Graphics))
            .context("failed to create the graphics queue")?;
        let compute = if config.enable_compute_queue {
            Some(
                CommandQueue::new(&device, config.queue_desc("Compute", QueueKind::Compute))
                    .context("failed to create the compute queue")?,
            )
        } else {
            log::info!("Compute queue disabled, compute work runs on the graphics queue");
            None
        };

        let render_targets = (0..swap_chain.back_buffer_count())
            .map(|index| {
                let back_buffer = swap_chain
                    .back_buffer(index)
                    .with_context(|| format!("the swap chain has no back buffer {index}"))?;
                ResourceDescriptor::create_rtv(
                    &heaps,
                    &Arc::downgrade(back_buffer),
                    RenderTargetViewDesc::default(),
                )
                .with_context(|| format!("failed to create the view of back buffer {index}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let depth_target = ResourceDescriptor::create_dsv(
            &heaps,
            &Arc::downgrade(swap_chain.depth_buffer()),
            DepthStencilViewDesc::default(),
        )
        .context("failed to create the depth buffer view")?;

        log::info!(
            "Backend ready: {} back buffers, ring of {}, {} techniques",
            config.back_buffer_count,
            config.command_ring_size,
            techniques.len()
        );
        Ok(Self {
            frame_fence_values: vec![0; config.back_buffer_count],
            render_mode: config.initial_render_mode,
            config,
            device,
            heaps,
            techniques,
            builtin,
            graphics,
            compute,
            swap_chain,
            render_targets,
            depth_target,
            rebuild_requested: false,
            last_rebuild_error: None,
            frame_index: 0,
            pending: FrameStats::default(),
            last_frame: None,
        })
    }

    /// Builds a backend on a new headless device and swap chain sized from `config`.
    ///
    /// The device is returned as well so its execution log and validation
    /// errors can be inspected.
    pub fn headless(
        config: BackendConfig,
        shaders: Arc<dyn ShaderProvider>,
    ) -> anyhow::Result<(Self, Arc<HeadlessDevice>)> {
        config.validate()?;
        let headless = Arc::new(HeadlessDevice::new());
        let swap_chain = HeadlessSwapChain::new(
            &headless,
            HeadlessSwapChainDesc {
                back_buffer_count: config.back_buffer_count,
                width: config.width,
                height: config.height,
                ..Default::default()
            },
        )
        .context("failed to create the headless swap chain")?;
        let device: Arc<dyn RenderDevice> = headless.clone();
        let backend = Self::new(device, Box::new(swap_chain), shaders, config)?;
        Ok((backend, headless))
    }

    // --- Frame loop ---

    /// Opens the next frame.
    ///
    /// Applies a pending shader rebuild, waits until the GPU is done with the
    /// previous frame rendered into the current back buffer, and opens the next
    /// graphics ring slot.
    /// ## Errors
    /// * `RenderError::Command` - If the previous frame was never presented.
    /// * Any device error raised by the flush, the wait or the slot reset.
    pub fn begin_frame(&mut self) -> Result<Frame<'_>, RenderError> {
        if self.frame_open() {
            return Err(CommandError::SlotStillRecording {
                queue: self.graphics.label().to_string(),
                slot: self.graphics.active_index(),
            }
            .into());
        }
        self.apply_pending_rebuild()?;

        let index = self.swap_chain.current_back_buffer_index();
        let wait_value = self.frame_fence_values[index];
        if !self.graphics.fence().is_complete(wait_value) {
            log::debug!("Waiting for back buffer {index} (fence value {wait_value})");
        }
        self.graphics.wait_on_cpu(wait_value)?;

        let (width, height) = self.swap_chain.extent();
        let back_buffer = self
            .swap_chain
            .back_buffer(index)
            .ok_or_else(|| RenderError::Presentation(format!("the swap chain has no back buffer {index}")))?;
        let mut slot = self.graphics.reset_active_cl()?;
        slot.list.set_viewport(&Viewport::from_extent(width, height));
        slot.list.set_scissor_rect(&ScissorRect::from_extent(width, height));
        slot.list.resource_barrier(back_buffer, ResourceState::RenderTarget);

        log::debug!("Frame {} begins on back buffer {index}", self.frame_index);
        Ok(Frame {
            slot,
            techniques: &self.techniques,
            builtin: self.builtin,
            render_mode: self.render_mode,
            back_buffer,
            render_target: &self.render_targets[index],
            depth_target: &self.depth_target,
            index,
            number: self.frame_index,
        })
    }

    /// Closes and submits the open frame, signals its fence value and presents.
    ///
    /// An occluded output is not an error; the back buffer is kept for the next
    /// frame.
    /// ## Errors
    /// * `RenderError::Command` - If no frame is open.
    /// * `RenderError::Presentation` - If the swap chain fails to present.
    pub fn present(&mut self) -> Result<PresentStatus, RenderError> {
        let index = self.swap_chain.current_back_buffer_index();
        let back_buffer = self
            .swap_chain
            .back_buffer(index)
            .ok_or_else(|| RenderError::Presentation(format!("the swap chain has no back buffer {index}")))?;
        let mut slot = self.graphics.active_cl()?;
        slot.list.resource_barrier(back_buffer, ResourceState::PRESENT);
        let graphics = self.graphics.execute_active_cl()?;
        let fence_value = self.graphics.signal()?;
        self.frame_fence_values[index] = fence_value;

        let status = self.swap_chain.present(PRESENT_SYNC_INTERVAL);
        let stats = FrameStats {
            frame: self.frame_index,
            back_buffer: index,
            fence_value,
            graphics,
            ..std::mem::take(&mut self.pending)
        };
        self.last_frame = Some(stats);
        self.frame_index += 1;

        match status {
            PresentStatus::Presented => {
                log::debug!("Frame {} presented (fence value {fence_value})", stats.frame)
            }
            PresentStatus::Occluded => log::debug!("Frame {} occluded", stats.frame),
            PresentStatus::Failed(code) => {
                log::error!("Present of frame {} failed with status {code:#010x}", stats.frame);
                return Err(RenderError::Presentation(format!(
                    "the swap chain returned status {code:#010x}"
                )));
            }
        }
        Ok(status)
    }

    /// Records work through `record` and submits it ahead of the graphics work.
    ///
    /// With a compute queue, the work is recorded into its next ring slot after
    /// a GPU-side wait on the last graphics submission, then signaled; the
    /// graphics queue waits on the GPU for that value, so everything it executes
    /// afterwards observes the results. The compute fence value is returned.
    ///
    /// While a frame is open, or without a compute queue, the work is recorded
    /// on the graphics queue: into the open frame if there is one, or into a
    /// submission of its own. `None` is returned since queue order already
    /// serializes it. An open frame's barriers are not on the GPU yet, so
    /// compute work must not run ahead of them.
    ///
    /// If `record` fails, a list of its own is discarded without submission
    /// and the barriers it recorded are rolled back.
    pub fn run_compute<F>(&mut self, record: F) -> Result<Option<u64>, RenderError>
    where
        F: FnOnce(&mut SlotRecorder<'_>, &Techniques) -> Result<(), RenderError>,
    {
        if self.compute.is_some() && self.frame_open() {
            log::debug!("Frame {} is open; recording compute work inline", self.frame_index);
            self.run_compute_on_graphics(record)?;
            return Ok(None);
        }
        let Some(compute) = self.compute.as_mut() else {
            self.run_compute_on_graphics(record)?;
            return Ok(None);
        };

        let graphics_value = self.graphics.last_signaled_value();
        if graphics_value > 0 {
            compute.wait_on_gpu(self.graphics.fence(), graphics_value)?;
        }
        let mut slot = compute.reset_active_cl()?;
        if let Err(err) = record(&mut slot, &self.techniques) {
            compute.discard_active_cl()?;
            return Err(err);
        }
        let stats = compute.execute_active_cl()?;
        let value = compute.signal()?;
        self.graphics.wait_on_gpu(compute.fence(), value)?;

        self.pending.compute += stats;
        self.pending.compute_submissions += 1;
        log::debug!("Compute submission signaled fence value {value}");
        Ok(Some(value))
    }

    fn run_compute_on_graphics<F>(&mut self, record: F) -> Result<(), RenderError>
    where
        F: FnOnce(&mut SlotRecorder<'_>, &Techniques) -> Result<(), RenderError>,
    {
        if self.frame_open() {
            let mut slot = self.graphics.active_cl()?;
            return record(&mut slot, &self.techniques);
        }

        let mut slot = self.graphics.reset_active_cl()?;
        if let Err(err) = record(&mut slot, &self.techniques) {
            self.graphics.discard_active_cl()?;
            return Err(err);
        }
        let stats = self.graphics.execute_active_cl()?;
        self.pending.compute += stats;
        self.pending.compute_submissions += 1;
        Ok(())
    }

    /// Whether a frame was begun and not presented yet.
    pub fn frame_open(&self) -> bool {
        self.graphics.slot_state(self.graphics.active_index()) == Some(SlotState::Recording)
    }

    // --- Render mode and rebuild ---

    /// Selects the technique used to draw the scene.
    ///
    /// Returns `false` and keeps the current mode if `mode` does not exist.
    pub fn set_render_mode(&mut self, mode: u32) -> bool {
        if self.builtin.render_mode(mode).is_none() {
            log::warn!("Ignoring unknown render mode {mode}, keeping {}", self.render_mode);
            return false;
        }
        if mode != self.render_mode {
            log::info!("Render mode {} -> {mode}", self.render_mode);
            self.render_mode = mode;
        }
        true
    }

    /// The current render mode.
    pub fn render_mode(&self) -> u32 {
        self.render_mode
    }

    /// The technique drawing the scene in the current render mode.
    pub fn render_mode_technique(&self) -> TechniqueId {
        self.builtin
            .render_mode(self.render_mode)
            .unwrap_or(self.builtin.forward)
    }

    /// Asks for every shader to be reloaded and every pipeline rebuilt at the
    /// next frame boundary.
    pub fn request_shader_rebuild(&mut self) {
        if !self.rebuild_requested {
            log::info!("Shader rebuild requested");
        }
        self.rebuild_requested = true;
    }

    /// Whether a rebuild is waiting for the next frame boundary.
    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_requested
    }

    /// The error of the last rebuild, if it failed.
    ///
    /// A failed rebuild keeps the previous pipelines in use.
    pub fn last_rebuild_error(&self) -> Option<&TechniqueError> {
        self.last_rebuild_error.as_ref()
    }

    fn apply_pending_rebuild(&mut self) -> Result<(), RenderError> {
        if !std::mem::take(&mut self.rebuild_requested) {
            return Ok(());
        }
        self.flush_all()?;
        match self.techniques.rebuild_shaders() {
            Ok(()) => {
                log::info!("Shader rebuild applied before frame {}", self.frame_index);
                self.last_rebuild_error = None;
            }
            Err(err) => {
                log::error!("Shader rebuild failed, the previous pipelines stay in use: {err}");
                self.last_rebuild_error = Some(err);
            }
        }
        Ok(())
    }

    /// Blocks until every queue has completed all submitted work.
    pub fn flush_all(&mut self) -> Result<(), RenderError> {
        if let Some(compute) = self.compute.as_mut() {
            compute.flush()?;
        }
        self.graphics.flush()?;
        Ok(())
    }

    // --- Accessors ---

    /// The configuration the backend was built with.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// The device.
    pub fn device(&self) -> &Arc<dyn RenderDevice> {
        &self.device
    }

    /// The CPU-visible descriptor pools, for creating views of application resources.
    pub fn heaps(&self) -> &Arc<DescriptorHeapCollection> {
        &self.heaps
    }

    /// The technique registry.
    pub fn techniques(&self) -> &Techniques {
        &self.techniques
    }

    /// The ids of the built-in techniques.
    pub fn builtin(&self) -> BuiltinTechniques {
        self.builtin
    }

    /// The graphics queue.
    pub fn graphics_queue(&self) -> &CommandQueue {
        &self.graphics
    }

    /// The compute queue, if enabled.
    pub fn compute_queue(&self) -> Option<&CommandQueue> {
        self.compute.as_ref()
    }

    /// The swap chain.
    pub fn swap_chain(&self) -> &dyn SwapChain {
        self.swap_chain.as_ref()
    }

    /// The swap chain, mutably.
    pub fn swap_chain_mut(&mut self) -> &mut dyn SwapChain {
        self.swap_chain.as_mut()
    }

    /// The graphics fence value that completes the last frame rendered into
    /// each back buffer; 0 if the back buffer was never rendered into.
    pub fn frame_fence_values(&self) -> &[u64] {
        &self.frame_fence_values
    }

    /// The number of frames presented so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// The statistics of the last presented frame.
    pub fn last_frame_stats(&self) -> Option<&FrameStats> {
        self.last_frame.as_ref()
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("frame_index", &self.frame_index)
            .field("render_mode", &self.render_mode)
            .field("rebuild_requested", &self.rebuild_requested)
            .field("graphics", &self.graphics)
            .field("compute", &self.compute)
            .field("swap_chain", &self.swap_chain)
            .finish()
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        if let Err(err) = self.flush_all() {
            log::error!("Failed to flush the backend on shutdown: {err}");
        }
    }
}

/// An open frame, recording into the active graphics ring slot.
///
/// The list starts with the viewport and scissor rectangle set to the swap
/// chain extent and the back buffer in its render target state. Dropping the
/// frame does not submit anything; call [`Backend::present`].
pub struct Frame<'a> {
    slot: SlotRecorder<'a>,
    techniques: &'a Techniques,
    builtin: BuiltinTechniques,
    render_mode: u32,
    back_buffer: &'a Arc<GpuResource>,
    render_target: &'a ResourceDescriptor,
    depth_target: &'a ResourceDescriptor,
    index: usize,
    number: u64,
}

impl<'a> Frame<'a> {
    /// The open command list.
    pub fn list(&mut self) -> &mut CommandList {
        self.slot.list
    }

    /// The shader-visible heap of the ring slot.
    pub fn heap(&mut self) -> &mut DynamicGpuHeap {
        self.slot.heap
    }

    /// The technique registry.
    pub fn techniques(&self) -> &'a Techniques {
        self.techniques
    }

    /// The ids of the built-in techniques.
    pub fn builtin(&self) -> BuiltinTechniques {
        self.builtin
    }

    /// The technique drawing the scene in the current render mode.
    pub fn scene_technique(&self) -> TechniqueId {
        self.builtin
            .render_mode(self.render_mode)
            .unwrap_or(self.builtin.forward)
    }

    /// The index of the back buffer being rendered into.
    pub fn back_buffer_index(&self) -> usize {
        self.index
    }

    /// The back buffer being rendered into.
    pub fn back_buffer(&self) -> &Arc<GpuResource> {
        self.back_buffer
    }

    /// The number of the frame, starting at 0.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// The render target view of the back buffer.
    pub fn render_target(&self) -> &ResourceDescriptor {
        self.render_target
    }

    /// The depth-stencil view of the depth buffer.
    pub fn depth_target(&self) -> &ResourceDescriptor {
        self.depth_target
    }

    /// Clears the back buffer to `color` and the depth buffer to the far plane.
    pub fn clear(&mut self, color: [f32; 4]) {
        self.slot.list.clear_render_target(self.render_target, color);
        self.slot.list.clear_depth_stencil(self.depth_target, 1.0, 0);
    }

    /// Binds a technique and the attachments it renders into.
    ///
    /// Graphics techniques get the back buffer only if they write color, and
    /// the depth buffer only if they declare a depth format.
    pub fn bind_technique(&mut self, id: TechniqueId) -> Result<(), RenderError> {
        self.slot.bind_technique(self.techniques, id)?;
        let technique = self.techniques.technique(id)?;
        if let PipelineDesc::Graphics(desc) = &technique.desc().pipeline {
            let targets = [self.render_target];
            let color = if technique.writes_color() {
                &targets[..]
            } else {
                &targets[..0]
            };
            let depth = desc.depth_format.map(|_| self.depth_target);
            self.slot.list.set_render_targets(color, depth);
        }
        Ok(())
    }

    /// Stages a view in a table of the bound technique's root signature.
    pub fn stage(&mut self, root_index: u32, offset: u32, view: &ResourceDescriptor) -> Result<(), HeapError> {
        self.slot.stage(root_index, offset, view)
    }

    /// Commits the staged tables; returns the number of descriptors copied.
    pub fn commit(&mut self) -> u32 {
        self.slot.commit()
    }
}

impl fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("number", &self.number)
            .field("back_buffer", &self.index)
            .field("render_mode", &self.render_mode)
            .finish()
    }
}
