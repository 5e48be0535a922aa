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

//! Runs the Ferrite frame loop on the headless device.
//!
//! Every frame culls instances on the compute queue, then draws a depth
//! pre-pass, the scene in the current render mode and a full screen blit.
//! Half-way through, the shaders are replaced and a rebuild is requested; a
//! few frames later the render mode switches to wireframe.
//!
//! Usage: `sandbox [config.ron]`

use anyhow::{bail, Context, Result};
use bytemuck::{Pod, Zeroable};
use ferrite_core::renderer::api::*;
use ferrite_sdk::prelude::*;
use ferrite_sdk::{init_logging, BuiltinCatalog};
use std::borrow::Cow;
use std::sync::Arc;

const FRAME_COUNT: u64 = 12;
const REBUILD_FRAME: u64 = 6;
const WIREFRAME_FRAME: u64 = 9;
const INSTANCE_COUNT: u32 = 64;
const CLEAR_COLOR: [f32; 4] = [0.05, 0.05, 0.08, 1.0];

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FrameConstants {
    view_projection: [[f32; 4]; 4],
    time: f32,
    _padding: [f32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DrawConstants {
    tint: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CullConstants {
    instance_count: u32,
    frame: u32,
    _padding: [u32; 2],
}

/// Fills `provider` with byte code for every built-in shader.
///
/// The headless device only checks that byte code is present, so each
/// revision is a distinct filler pattern.
fn compile_shaders(provider: &MemoryShaderProvider, revision: u8) {
    for (shader, stage) in BuiltinCatalog::new(Format::Rgba8Unorm, Format::D32Float).shaders() {
        let mut bytes = format!("{}:{}:{}", shader.name, shader.entry_point, stage.as_str()).into_bytes();
        bytes.push(revision);
        provider.insert(&shader.name, &shader.entry_point, stage, bytes);
    }
    log::info!("Shader revision {revision} ready");
}

/// The resources the demo draws with.
struct Scene {
    instances: Arc<GpuResource>,
    instances_uav: Arc<ResourceDescriptor>,
    bounds_srv: Arc<ResourceDescriptor>,
    material_srv: Arc<ResourceDescriptor>,
    frame_constants: Vec<Arc<GpuResource>>,
    // The views only hold weak references.
    _bounds: Arc<GpuResource>,
    _material: Arc<GpuResource>,
}

impl Scene {
    fn new(backend: &Backend) -> Result<Self> {
        let device = backend.device();
        let heaps = backend.heaps();

        let instances = GpuResource::create_buffer(
            device,
            &BufferDescriptor {
                label: Some(Cow::Borrowed("Visible Instances")),
                size: u64::from(INSTANCE_COUNT) * 4,
                heap: HeapKind::Default,
                allow_unordered_access: true,
            },
            ResourceState::Common,
        )?;
        let instances_uav = ResourceDescriptor::create_uav(
            heaps,
            &Arc::downgrade(&instances),
            UnorderedAccessViewDesc {
                format: Format::Unknown,
                range: UnorderedAccessRange::Buffer {
                    first_element: 0,
                    num_elements: INSTANCE_COUNT,
                    structure_byte_stride: 4,
                },
            },
        )?;

        let bounds = GpuResource::create_buffer(
            device,
            &BufferDescriptor {
                label: Some(Cow::Borrowed("Instance Bounds")),
                size: u64::from(INSTANCE_COUNT) * 16,
                heap: HeapKind::Default,
                allow_unordered_access: false,
            },
            ResourceState::NonPixelShaderResource,
        )?;
        let bounds_srv = ResourceDescriptor::create_srv(
            heaps,
            &Arc::downgrade(&bounds),
            ShaderResourceViewDesc {
                format: Format::Unknown,
                range: ShaderResourceRange::Buffer {
                    first_element: 0,
                    num_elements: INSTANCE_COUNT,
                    structure_byte_stride: 16,
                    raw: false,
                },
            },
        )?;

        let material = GpuResource::create_texture(
            device,
            &TextureDescriptor {
                label: Some(Cow::Borrowed("Albedo")),
                width: 256,
                height: 256,
                ..Default::default()
            },
            ResourceState::PixelShaderResource,
        )?;
        let material_srv = ResourceDescriptor::create_srv(
            heaps,
            &Arc::downgrade(&material),
            ShaderResourceViewDesc {
                format: Format::Rgba8Unorm,
                range: ShaderResourceRange::Texture2D {
                    most_detailed_mip: 0,
                    mip_levels: u32::MAX,
                },
            },
        )?;

        let frame_constants = (0..backend.config().back_buffer_count)
            .map(|index| {
                GpuResource::create_buffer(
                    device,
                    &BufferDescriptor {
                        label: Some(Cow::Owned(format!("Frame Constants {index}"))),
                        size: 256,
                        heap: HeapKind::Upload,
                        allow_unordered_access: false,
                    },
                    ResourceState::GenericRead,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            instances,
            instances_uav,
            bounds_srv,
            material_srv,
            frame_constants,
            _bounds: bounds,
            _material: material,
        })
    }

    fn cull(&self, backend: &mut Backend, frame: u64) -> Result<()> {
        let cull = backend.builtin().compute_cull;
        backend.run_compute(|slot, techniques| {
            slot.list.begin_event("Cull");
            slot.list
                .resource_barrier(&self.instances, ResourceState::UnorderedAccess);
            slot.bind_technique(techniques, cull)?;
            slot.stage(compute_root::RESOURCE_TABLE, compute_root::OUTPUT_SLOT, &self.instances_uav)?;
            slot.stage(compute_root::RESOURCE_TABLE, compute_root::INPUT_SLOT, &self.bounds_srv)?;
            slot.commit();
            slot.list.set_compute_root_constants(
                compute_root::DISPATCH_CONSTANTS,
                &CullConstants {
                    instance_count: INSTANCE_COUNT,
                    frame: frame as u32,
                    _padding: [0; 2],
                },
            );
            slot.list.dispatch(INSTANCE_COUNT.div_ceil(64), 1, 1);
            slot.list.end_event();
            Ok(())
        })?;
        Ok(())
    }

    fn draw(&self, backend: &mut Backend, frame_number: u64) -> Result<()> {
        let mut frame = backend.begin_frame()?;
        let builtin = frame.builtin();

        let constants = &self.frame_constants[frame.back_buffer_index()];
        constants.write(
            0,
            bytemuck::bytes_of(&FrameConstants {
                view_projection: [
                    [1.0, 0.0, 0.0, 0.0],
                    [0.0, 1.0, 0.0, 0.0],
                    [0.0, 0.0, 1.0, 0.0],
                    [0.0, 0.0, 0.0, 1.0],
                ],
                time: frame_number as f32 / 60.0,
                _padding: [0.0; 3],
            }),
        )?;

        frame.clear(CLEAR_COLOR);
        frame
            .list()
            .resource_barrier(&self.instances, ResourceState::NonPixelShaderResource);

        frame.list().begin_event("Depth pre-pass");
        frame.bind_technique(builtin.depth_only)?;
        self.bind_scene_arguments(&mut frame, constants, [1.0; 4])?;
        frame.list().draw(36, INSTANCE_COUNT, 0, 0);
        frame.list().end_event();

        frame.list().begin_event("Scene");
        let scene = frame.scene_technique();
        frame.bind_technique(scene)?;
        self.bind_scene_arguments(&mut frame, constants, [0.8, 0.6, 0.3, 1.0])?;
        frame.list().draw(36, INSTANCE_COUNT, 0, 0);
        frame.list().end_event();

        frame.list().begin_event("Blit");
        frame.bind_technique(builtin.fullscreen_blit)?;
        self.bind_scene_arguments(&mut frame, constants, [1.0; 4])?;
        frame.list().draw(3, 1, 0, 0);
        frame.list().end_event();
        Ok(())
    }

    fn bind_scene_arguments(&self, frame: &mut Frame<'_>, constants: &GpuResource, tint: [f32; 4]) -> Result<()> {
        frame.stage(scene_root::MATERIAL_TABLE, 0, &self.material_srv)?;
        frame.commit();
        let list = frame.list();
        list.set_graphics_root_constants(scene_root::DRAW_CONSTANTS, &DrawConstants { tint });
        list.set_root_constant_buffer(
            PipelineBindPoint::Graphics,
            scene_root::FRAME_CONSTANTS,
            constants,
        );
        list.set_root_shader_resource(PipelineBindPoint::Graphics, scene_root::INSTANCES, &self.instances);
        Ok(())
    }
}

fn main() -> Result<()> {
    init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => BackendConfig::load(&path).with_context(|| format!("failed to load '{path}'"))?,
        None => BackendConfig::default(),
    };
    let shaders = Arc::new(MemoryShaderProvider::new());
    compile_shaders(&shaders, 1);

    let (mut backend, headless) = Backend::headless(config, shaders.clone())?;
    let scene = Scene::new(&backend)?;

    for frame in 0..FRAME_COUNT {
        if frame == REBUILD_FRAME {
            compile_shaders(&shaders, 2);
            backend.request_shader_rebuild();
        }
        if frame == WIREFRAME_FRAME {
            backend.set_render_mode(1);
        }

        scene.cull(&mut backend, frame)?;
        scene.draw(&mut backend, frame)?;
        let status = backend.present()?;

        if let Some(stats) = backend.last_frame_stats() {
            let total = stats.total();
            log::info!(
                "Frame {} ({status:?}) on back buffer {}: {} draws, {} dispatches, {} barriers ({} redundant), {} descriptor copies",
                stats.frame,
                stats.back_buffer,
                total.draws,
                total.dispatches,
                total.barriers,
                total.redundant_barriers,
                total.descriptor_copies
            );
        }
        if let Some(err) = backend.last_rebuild_error() {
            log::warn!("Last shader rebuild failed: {err}");
        }
    }
    backend.flush_all()?;

    let errors = headless.validation_errors();
    for error in &errors {
        log::error!("{error}");
    }
    if !errors.is_empty() {
        bail!("the headless device reported {} validation error(s)", errors.len());
    }

    let forward = backend.techniques().technique(backend.builtin().forward)?;
    log::info!(
        "Rendered {} frames; '{}' is at pipeline generation {}",
        backend.frame_index(),
        forward.label(),
        forward.generation()
    );
    Ok(())
}
