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

use super::device::HeadlessDevice;
use super::queue::QueueOp;
use super::state::DeviceState;
use ferrite_core::renderer::api::*;
use ferrite_core::renderer::error::{DeviceError, STATUS_FAIL, STATUS_INVALID_ARG};
use ferrite_core::renderer::resource::GpuResource;
use ferrite_core::renderer::traits::{PresentStatus, RenderDevice, SwapChain};
use ferrite_core::utils::lock;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// How to build a [`HeadlessSwapChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessSwapChainDesc {
    /// The number of back buffers.
    pub back_buffer_count: usize,
    /// The width in pixels.
    pub width: u32,
    /// The height in pixels.
    pub height: u32,
    /// The format of the back buffers.
    pub format: Format,
    /// The format of the depth buffer.
    pub depth_format: Format,
}

impl Default for HeadlessSwapChainDesc {
    fn default() -> Self {
        Self {
            back_buffer_count: 2,
            width: 1280,
            height: 720,
            format: Format::Rgba8Unorm,
            depth_format: Format::D32Float,
        }
    }
}

/// An offscreen swap chain.
///
/// Presents go through the most recently created graphics queue, so they are
/// ordered after the work submitted before them and the back buffer state is
/// checked on the GPU timeline.
pub struct HeadlessSwapChain {
    state: Arc<DeviceState>,
    back_buffers: Vec<Arc<GpuResource>>,
    depth: Arc<GpuResource>,
    current: usize,
    extent: (u32, u32),
    formats: (Format, Format),
    occluded: bool,
}

impl HeadlessSwapChain {
    /// Creates the back buffers in the present state and the depth buffer in depth-write.
    pub fn new(device: &Arc<HeadlessDevice>, desc: HeadlessSwapChainDesc) -> Result<Self, DeviceError> {
        let render_device: Arc<dyn RenderDevice> = device.clone();
        let back_buffers = (0..desc.back_buffer_count)
            .map(|index| {
                GpuResource::create_texture(
                    &render_device,
                    &TextureDescriptor {
                        label: Some(Cow::Owned(format!("Back Buffer {index}"))),
                        width: desc.width,
                        height: desc.height,
                        format: desc.format,
                        usage: TextureUsage::RENDER_TARGET,
                        clear_value: Some(ClearValue::Color([0.0, 0.0, 0.0, 1.0])),
                        ..Default::default()
                    },
                    ResourceState::PRESENT,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let depth = GpuResource::create_texture(
            &render_device,
            &TextureDescriptor {
                label: Some(Cow::Borrowed("Depth Buffer")),
                width: desc.width,
                height: desc.height,
                format: desc.depth_format,
                usage: TextureUsage::DEPTH_STENCIL,
                clear_value: Some(ClearValue::DepthStencil {
                    depth: 1.0,
                    stencil: 0,
                }),
                ..Default::default()
            },
            ResourceState::DepthWrite,
        )?;

        log::info!(
            "Created headless swap chain: {} x {}x{} {:?}",
            desc.back_buffer_count,
            desc.width,
            desc.height,
            desc.format
        );
        Ok(Self {
            state: device.shared_state().clone(),
            back_buffers,
            depth,
            current: 0,
            extent: (desc.width, desc.height),
            formats: (desc.format, desc.depth_format),
            occluded: false,
        })
    }

    /// Simulates the output window being hidden or shown again.
    pub fn set_occluded(&mut self, occluded: bool) {
        self.occluded = occluded;
    }
}

impl fmt::Debug for HeadlessSwapChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessSwapChain")
            .field("back_buffers", &self.back_buffers.len())
            .field("current", &self.current)
            .field("extent", &self.extent)
            .field("occluded", &self.occluded)
            .finish()
    }
}

impl SwapChain for HeadlessSwapChain {
    fn back_buffer_count(&self) -> usize {
        self.back_buffers.len()
    }

    fn current_back_buffer_index(&self) -> usize {
        self.current
    }

    fn back_buffer(&self, index: usize) -> Option<&Arc<GpuResource>> {
        self.back_buffers.get(index)
    }

    fn depth_buffer(&self) -> &Arc<GpuResource> {
        &self.depth
    }

    fn extent(&self) -> (u32, u32) {
        self.extent
    }

    fn format(&self) -> Format {
        self.formats.0
    }

    fn depth_format(&self) -> Format {
        self.formats.1
    }

    fn present(&mut self, _sync_interval: u32) -> PresentStatus {
        if self.occluded {
            return PresentStatus::Occluded;
        }
        let Some(back_buffer) = self.back_buffers.get(self.current) else {
            return PresentStatus::Failed(STATUS_FAIL);
        };
        if back_buffer.state() != ResourceState::PRESENT {
            log::error!(
                "{} presented while tracked in {:?}",
                back_buffer.label(),
                back_buffer.state()
            );
            return PresentStatus::Failed(STATUS_INVALID_ARG);
        }

        let sent = lock(&self.state.present_queue)
            .as_ref()
            .map(|(_, sender)| {
                sender.send(QueueOp::Present {
                    resource: back_buffer.native(),
                })
            });
        match sent {
            Some(Ok(())) => {
                self.current = (self.current + 1) % self.back_buffers.len();
                PresentStatus::Presented
            }
            _ => {
                log::error!("No graphics queue is available to present");
                PresentStatus::Failed(STATUS_FAIL)
            }
        }
    }
}
