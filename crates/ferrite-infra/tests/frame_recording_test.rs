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

//! End-to-end recording scenarios on the headless backend.
//!
//! Every test records real command lists through the core types, lets the
//! queue timelines replay them, and then inspects the device's actual resource
//! states and validation errors.

use ferrite_core::renderer::api::*;
use ferrite_core::renderer::command::{CommandQueue, CommandQueueDesc};
use ferrite_core::renderer::descriptor::{
    DescriptorHeapCollection, DescriptorPoolSizes, ResourceDescriptor,
};
use ferrite_core::renderer::error::{CapacityError, TechniqueError, ViewError, STATUS_INVALID_ARG};
use ferrite_core::renderer::pipeline::{TechniqueCatalog, TechniqueDesc, TechniqueId, Techniques};
use ferrite_core::renderer::resource::GpuResource;
use ferrite_core::renderer::traits::{PresentStatus, RenderDevice, SwapChain};
use ferrite_infra::graphics::headless::{
    ExecutionEvent, HeadlessDevice, HeadlessSwapChain, HeadlessSwapChainDesc, ValidationError,
};
use ferrite_infra::shaders::MemoryShaderProvider;
use std::borrow::Cow;
use std::sync::Arc;

struct Fixture {
    headless: Arc<HeadlessDevice>,
    device: Arc<dyn RenderDevice>,
    shaders: Arc<MemoryShaderProvider>,
    techniques: Techniques,
    depth_only: TechniqueId,
    forward: TechniqueId,
    cull: TechniqueId,
}

/// Helper: a device with a two-signature, three-technique registry.
fn fixture() -> Fixture {
    let headless = Arc::new(HeadlessDevice::new());
    let device: Arc<dyn RenderDevice> = headless.clone();
    let shaders = Arc::new(
        MemoryShaderProvider::new()
            .with("scene", "VSMain", ShaderStage::Vertex, vec![1u8; 16])
            .with("scene", "PSMain", ShaderStage::Pixel, vec![2u8; 16])
            .with("cull", "CSMain", ShaderStage::Compute, vec![3u8; 16]),
    );

    let mut catalog = TechniqueCatalog::new();
    let scene = catalog.add_root_signature(RootSignatureDesc {
        label: Some(Cow::Borrowed("scene")),
        parameters: vec![
            RootParameter::constants(0, 4),
            RootParameter::table([DescriptorRange::new(DescriptorRangeType::Srv, 1, 0)]),
            RootParameter::cbv(1),
        ],
        allow_input_layout: true,
        ..Default::default()
    });
    let compute = catalog.add_root_signature(RootSignatureDesc {
        label: Some(Cow::Borrowed("compute")),
        parameters: vec![
            RootParameter::table([DescriptorRange::new(DescriptorRangeType::Uav, 1, 0)]),
            RootParameter::constants(0, 1),
        ],
        ..Default::default()
    });

    let depth_only = catalog.add_technique(TechniqueDesc {
        label: "depth".to_string(),
        root_signature: scene,
        pipeline: PipelineDesc::Graphics(GraphicsPipelineDesc {
            depth_format: Some(Format::D32Float),
            ..GraphicsPipelineDesc::new(ShaderRef::new("scene", "VSMain"), None)
        }),
        writes_color: false,
    });
    let forward = catalog.add_technique(TechniqueDesc {
        label: "forward".to_string(),
        root_signature: scene,
        pipeline: PipelineDesc::Graphics(GraphicsPipelineDesc {
            render_target_formats: vec![Format::Rgba8Unorm],
            depth_format: Some(Format::D32Float),
            ..GraphicsPipelineDesc::new(
                ShaderRef::new("scene", "VSMain"),
                Some(ShaderRef::new("scene", "PSMain")),
            )
        }),
        writes_color: true,
    });
    let cull = catalog.add_technique(TechniqueDesc {
        label: "cull".to_string(),
        root_signature: compute,
        pipeline: PipelineDesc::Compute(ComputePipelineDesc {
            shader: ShaderRef::new("cull", "CSMain"),
        }),
        writes_color: false,
    });

    let mut techniques = Techniques::new(device.clone(), shaders.clone());
    techniques.on_init(&catalog).expect("catalog builds");

    Fixture {
        headless,
        device,
        shaders,
        techniques,
        depth_only,
        forward,
        cull,
    }
}

fn buffer(
    device: &Arc<dyn RenderDevice>,
    label: &'static str,
    size: u64,
    heap: HeapKind,
    state: ResourceState,
) -> Arc<GpuResource> {
    GpuResource::create_buffer(
        device,
        &BufferDescriptor {
            label: Some(Cow::Borrowed(label)),
            size,
            heap,
            allow_unordered_access: heap == HeapKind::Default,
        },
        state,
    )
    .expect("buffer is created")
}

fn render_target(device: &Arc<dyn RenderDevice>) -> Arc<GpuResource> {
    GpuResource::create_texture(
        device,
        &TextureDescriptor {
            label: Some(Cow::Borrowed("offscreen")),
            width: 64,
            height: 64,
            usage: TextureUsage::RENDER_TARGET,
            ..Default::default()
        },
        ResourceState::RenderTarget,
    )
    .expect("texture is created")
}

// ─────────────────────────────────────────────────────────────────────────────
// Frames
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_forward_frame_transitions_the_back_buffer_exactly_twice() {
    // ARRANGE
    let f = fixture();
    let mut swap_chain =
        HeadlessSwapChain::new(&f.headless, HeadlessSwapChainDesc::default()).expect("swap chain");
    let heaps = DescriptorHeapCollection::new(&f.device, DescriptorPoolSizes::default())
        .expect("descriptor pools");
    let back_buffer = swap_chain.back_buffer(0).expect("back buffer 0").clone();
    let rtv = ResourceDescriptor::create_rtv(
        &heaps,
        &Arc::downgrade(&back_buffer),
        RenderTargetViewDesc::default(),
    )
    .expect("rtv");
    let dsv = ResourceDescriptor::create_dsv(
        &heaps,
        &Arc::downgrade(swap_chain.depth_buffer()),
        DepthStencilViewDesc::default(),
    )
    .expect("dsv");
    let instances = buffer(
        &f.device,
        "instances",
        256,
        HeapKind::Default,
        ResourceState::PixelShaderResource,
    );
    let srv = ResourceDescriptor::create_srv(
        &heaps,
        &Arc::downgrade(&instances),
        ShaderResourceViewDesc {
            format: Format::Unknown,
            range: ShaderResourceRange::Buffer {
                first_element: 0,
                num_elements: 16,
                structure_byte_stride: 16,
                raw: false,
            },
        },
    )
    .expect("srv");
    let mut gfx = CommandQueue::new(&f.device, CommandQueueDesc::new("gfx", QueueKind::Graphics))
        .expect("queue");

    // ACT
    {
        let mut slot = gfx.reset_active_cl().expect("slot");
        assert!(slot.list.resource_barrier(&back_buffer, ResourceState::RenderTarget));
        assert!(!slot.list.resource_barrier(&back_buffer, ResourceState::RenderTarget));
        slot.list.set_viewport(&Viewport::from_extent(1280, 720));
        slot.list.set_scissor_rect(&ScissorRect::from_extent(1280, 720));
        slot.list.set_render_targets(&[&rtv], Some(&dsv));
        slot.list.clear_render_target(&rtv, [0.1, 0.2, 0.3, 1.0]);
        slot.list.clear_depth_stencil(&dsv, 1.0, 0);
        slot.bind_technique(&f.techniques, f.forward).expect("forward binds");
        slot.list.set_graphics_root_constants(0, &[1.0f32, 0.0, 0.0, 1.0]);
        slot.stage(1, 0, &srv).expect("srv is staged");
        assert_eq!(slot.commit(), 1);

        let (_, _, table) = slot.heap.table(1).expect("table 1 is cached");
        let content = f.headless.gpu_descriptor(table).expect("table slot is filled");
        assert_eq!(content.resource, instances.native());
        assert_eq!(content.kind, ViewKind::Srv);

        slot.list.debug_scope("Forward", |list| {
            list.set_primitive_topology(PrimitiveTopology::TriangleList);
            list.draw(3, 1, 0, 0);
        });
        assert!(slot.list.resource_barrier(&back_buffer, ResourceState::PRESENT));
    }
    let stats = gfx.execute_active_cl().expect("frame is submitted");
    assert_eq!(swap_chain.present(1), PresentStatus::Presented);
    gfx.flush().expect("frame completes");

    // ASSERT
    assert_eq!(stats.barriers, 2);
    assert_eq!(stats.barrier_calls, 2);
    assert_eq!(stats.redundant_barriers, 1);
    assert_eq!(stats.draws, 1);
    assert_eq!(stats.descriptor_copies, 1);
    assert_eq!(swap_chain.current_back_buffer_index(), 1);
    assert_eq!(
        f.headless.actual_state(back_buffer.native()),
        Some(ResourceState::PRESENT)
    );
    assert!(f.headless.execution_log().contains(&ExecutionEvent::Presented {
        queue: "gfx".to_string(),
        resource: back_buffer.native(),
    }));
    assert!(
        f.headless.validation_errors().is_empty(),
        "{:#?}",
        f.headless.validation_errors()
    );
}

#[test]
fn test_depth_only_technique_writes_no_color() {
    let f = fixture();
    assert!(!f.techniques.tech_has_color(f.depth_only).expect("depth technique"));
    assert!(f.techniques.tech_has_color(f.forward).expect("forward technique"));
    assert!(f.techniques.tech_has_color(TechniqueId(42)).is_err());
}

#[test]
fn test_present_refuses_a_back_buffer_left_as_render_target() {
    let f = fixture();
    let mut swap_chain =
        HeadlessSwapChain::new(&f.headless, HeadlessSwapChainDesc::default()).expect("swap chain");
    let back_buffer = swap_chain.back_buffer(0).expect("back buffer 0").clone();
    let mut gfx = CommandQueue::new(&f.device, CommandQueueDesc::new("gfx", QueueKind::Graphics))
        .expect("queue");

    {
        let mut slot = gfx.reset_active_cl().expect("slot");
        slot.list.resource_barrier(&back_buffer, ResourceState::RenderTarget);
    }
    gfx.execute_active_cl().expect("frame is submitted");
    gfx.flush().expect("frame completes");

    assert_eq!(swap_chain.present(1), PresentStatus::Failed(STATUS_INVALID_ARG));
    assert_eq!(swap_chain.current_back_buffer_index(), 0);

    swap_chain.set_occluded(true);
    assert_eq!(swap_chain.present(1), PresentStatus::Occluded);
}

#[test]
fn test_compute_dispatch_on_the_compute_queue() {
    let f = fixture();
    let heaps = DescriptorHeapCollection::new(&f.device, DescriptorPoolSizes::default())
        .expect("descriptor pools");
    let visibility = buffer(&f.device, "visibility", 1024, HeapKind::Default, ResourceState::Common);
    let uav = ResourceDescriptor::create_uav(
        &heaps,
        &Arc::downgrade(&visibility),
        UnorderedAccessViewDesc {
            format: Format::R32Uint,
            range: UnorderedAccessRange::Buffer {
                first_element: 0,
                num_elements: 256,
                structure_byte_stride: 0,
            },
        },
    )
    .expect("uav");
    let mut compute =
        CommandQueue::new(&f.device, CommandQueueDesc::new("compute", QueueKind::Compute))
            .expect("queue");

    {
        let mut slot = compute.reset_active_cl().expect("slot");
        slot.list.resource_barrier(&visibility, ResourceState::UnorderedAccess);
        slot.bind_technique(&f.techniques, f.cull).expect("cull binds");
        assert_eq!(slot.list.bind_point(), PipelineBindPoint::Compute);
        slot.stage(0, 0, &uav).expect("uav is staged");
        slot.commit();
        slot.list.set_compute_root_constants(1, &64u32);
        slot.list.dispatch(4, 1, 1);
    }
    let stats = compute.execute_active_cl().expect("pass is submitted");
    compute.flush().expect("pass completes");

    assert_eq!(stats.dispatches, 1);
    assert_eq!(
        f.headless.actual_state(visibility.native()),
        Some(ResourceState::UnorderedAccess)
    );
    assert!(f.headless.validation_errors().is_empty());
}

#[test]
fn test_dispatch_without_a_compute_pipeline_is_reported() {
    let f = fixture();
    let mut compute =
        CommandQueue::new(&f.device, CommandQueueDesc::new("compute", QueueKind::Compute))
            .expect("queue");

    {
        let mut slot = compute.reset_active_cl().expect("slot");
        slot.list.dispatch(1, 1, 1);
    }
    compute.execute_active_cl().expect("pass is submitted");
    compute.flush().expect("pass completes");

    assert_eq!(
        f.headless.validation_errors(),
        vec![ValidationError::MissingPipeline {
            list: "compute list 0".to_string(),
            operation: "dispatch",
            expected: "compute",
        }]
    );
}

#[test]
fn test_copy_buffer_region_round_trips_through_the_gpu() {
    let f = fixture();
    let payload: Vec<u8> = (0..16).collect();
    let upload = buffer(&f.device, "upload", 16, HeapKind::Upload, ResourceState::Common);
    let gpu = buffer(&f.device, "gpu", 16, HeapKind::Default, ResourceState::Common);
    let readback = buffer(&f.device, "readback", 16, HeapKind::Readback, ResourceState::Common);
    assert_eq!(upload.state(), ResourceState::GenericRead);
    assert_eq!(readback.state(), ResourceState::CopyDest);
    upload.write(0, &payload).expect("upload is written");

    let mut gfx = CommandQueue::new(&f.device, CommandQueueDesc::new("gfx", QueueKind::Graphics))
        .expect("queue");
    {
        let mut slot = gfx.reset_active_cl().expect("slot");
        slot.list.resource_barrier(&gpu, ResourceState::CopyDest);
        slot.list.copy_buffer_region(&gpu, 0, &upload, 0, 16);
        slot.list.resource_barrier(&gpu, ResourceState::CopySource);
        slot.list.copy_buffer_region(&readback, 0, &gpu, 0, 16);
    }
    gfx.execute_active_cl().expect("copies are submitted");
    gfx.flush().expect("copies complete");

    assert_eq!(f.headless.read_buffer(readback.native()), Some(payload));
    assert!(f.headless.validation_errors().is_empty());
}

#[test]
fn test_copy_with_overflowing_offsets_is_skipped_and_the_queue_keeps_running() {
    let f = fixture();
    let payload: Vec<u8> = (100..116).collect();
    let upload = buffer(&f.device, "upload", 16, HeapKind::Upload, ResourceState::Common);
    let readback = buffer(&f.device, "readback", 16, HeapKind::Readback, ResourceState::Common);
    upload.write(0, &payload).expect("upload is written");

    let mut gfx = CommandQueue::new(&f.device, CommandQueueDesc::new("gfx", QueueKind::Graphics))
        .expect("queue");

    // ACT: both offsets wrap around when the size is added.
    {
        let mut slot = gfx.reset_active_cl().expect("slot");
        slot.list.copy_buffer_region(&readback, 0, &upload, u64::MAX - 3, 16);
        slot.list.copy_buffer_region(&readback, u64::MAX, &upload, 0, 16);
    }
    gfx.execute_active_cl().expect("copies are submitted");
    gfx.flush().expect("the worker survives");

    // ASSERT: nothing was copied, and the next submission still executes.
    assert_ne!(f.headless.read_buffer(readback.native()), Some(payload.clone()));
    {
        let mut slot = gfx.reset_active_cl().expect("slot");
        slot.list.copy_buffer_region(&readback, 0, &upload, 0, 16);
    }
    gfx.execute_active_cl().expect("copy is submitted");
    gfx.flush().expect("copy completes");

    assert_eq!(f.headless.read_buffer(readback.native()), Some(payload));
    assert!(f.headless.validation_errors().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Shader rebuild
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_rebuild_keeps_ids_and_replaces_pipelines() {
    // ARRANGE
    let mut f = fixture();
    let before: Vec<_> = f.techniques.iter().map(|t| t.pipeline()).collect();
    let live = f.headless.live_pipelines();
    f.shaders
        .insert("scene", "PSMain", ShaderStage::Pixel, vec![9u8; 32]);

    // ACT
    f.techniques.rebuild_shaders().expect("rebuild succeeds");

    // ASSERT
    let after: Vec<_> = f.techniques.iter().map(|t| t.pipeline()).collect();
    assert_eq!(f.techniques.find("forward"), Some(f.forward));
    assert!(before.iter().zip(&after).all(|(old, new)| old != new));
    assert_eq!(f.headless.live_pipelines(), live);
    assert_eq!(f.shaders.resets(), 1);
    assert_eq!(
        f.techniques.technique(f.forward).expect("forward").generation(),
        1
    );
}

#[test]
fn test_failed_rebuild_keeps_the_previous_pipelines() {
    let mut f = fixture();
    let before: Vec<_> = f.techniques.iter().map(|t| t.pipeline()).collect();
    let live = f.headless.live_pipelines();
    assert!(f.shaders.remove("cull", "CSMain", ShaderStage::Compute));

    let err = f.techniques.rebuild_shaders().expect_err("cull cannot load");

    assert!(matches!(err, TechniqueError::Shader { ref technique, .. } if technique == "cull"));
    let after: Vec<_> = f.techniques.iter().map(|t| t.pipeline()).collect();
    assert_eq!(before, after);
    assert_eq!(f.headless.live_pipelines(), live);
}

// ─────────────────────────────────────────────────────────────────────────────
// Descriptor pools
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_rtv_pool_is_exhausted_by_the_33rd_view() {
    let f = fixture();
    let heaps = DescriptorHeapCollection::new(&f.device, DescriptorPoolSizes::default())
        .expect("descriptor pools");
    let target = render_target(&f.device);

    for _ in 0..32 {
        ResourceDescriptor::create_rtv(&heaps, &Arc::downgrade(&target), RenderTargetViewDesc::default())
            .expect("slot available");
    }
    let err = ResourceDescriptor::create_rtv(
        &heaps,
        &Arc::downgrade(&target),
        RenderTargetViewDesc::default(),
    )
    .expect_err("pool is full");

    assert!(matches!(
        err,
        ViewError::Capacity(CapacityError {
            capacity: 32,
            in_use: 32,
            ..
        })
    ));
    assert_eq!(heaps.in_use(DescriptorHeapType::Rtv), 32);
}

#[test]
fn test_view_of_a_released_resource_consumes_no_slot() {
    let f = fixture();
    let heaps = DescriptorHeapCollection::new(&f.device, DescriptorPoolSizes::default())
        .expect("descriptor pools");
    let target = render_target(&f.device);
    let weak = Arc::downgrade(&target);
    let view = ResourceDescriptor::create_rtv(&heaps, &weak, RenderTargetViewDesc::default())
        .expect("rtv");
    let live = f.headless.live_resources();

    drop(target);

    assert!(view.is_expired());
    assert_eq!(f.headless.live_resources(), live - 1);
    assert!(matches!(
        ResourceDescriptor::create_rtv(&heaps, &weak, RenderTargetViewDesc::default()),
        Err(ViewError::Expired)
    ));
    assert_eq!(heaps.in_use(DescriptorHeapType::Rtv), 1);
}
