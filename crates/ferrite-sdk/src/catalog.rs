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

//! The techniques every [`Backend`](crate::Backend) registers at start-up.
//!
//! Two root signatures are declared:
//!
//! - the **scene** signature, shared by every graphics technique, with inline
//!   draw constants, a table of material textures, a per-frame constant buffer
//!   and a root instance buffer;
//! - the **compute** signature, with a table holding one UAV followed by one SRV
//!   and a block of dispatch constants.
//!
//! Shaders are looked up by name through the backend's
//! [`ShaderProvider`](ferrite_core::renderer::traits::ShaderProvider).

use ferrite_core::renderer::api::*;
use ferrite_core::renderer::pipeline::{RootSignatureId, TechniqueCatalog, TechniqueDesc, TechniqueId};
use std::borrow::Cow;

/// Root parameter indices of the scene root signature.
pub mod scene_root {
    /// Four 32-bit draw constants at `b0`.
    pub const DRAW_CONSTANTS: u32 = 0;
    /// A table of [`MATERIAL_TEXTURES`] SRVs starting at `t0`.
    pub const MATERIAL_TABLE: u32 = 1;
    /// The per-frame constant buffer at `b1`.
    pub const FRAME_CONSTANTS: u32 = 2;
    /// The instance buffer at `t4`.
    pub const INSTANCES: u32 = 3;
    /// The size of the material table.
    pub const MATERIAL_TEXTURES: u32 = 4;
}

/// Root parameter indices of the compute root signature.
pub mod compute_root {
    /// A table holding the output UAV at `u0` then the input SRV at `t0`.
    pub const RESOURCE_TABLE: u32 = 0;
    /// The offset of the output UAV inside the table.
    pub const OUTPUT_SLOT: u32 = 0;
    /// The offset of the input SRV inside the table.
    pub const INPUT_SLOT: u32 = 1;
    /// Four 32-bit dispatch constants at `b0`.
    pub const DISPATCH_CONSTANTS: u32 = 1;
}

/// The ids of the built-in root signatures and techniques.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinTechniques {
    /// The scene root signature.
    pub scene_root: RootSignatureId,
    /// The compute root signature.
    pub compute_root: RootSignatureId,
    /// A depth pre-pass without color output.
    pub depth_only: TechniqueId,
    /// Solid shading tested against the pre-pass depth.
    pub forward: TechniqueId,
    /// Triangle edges drawn over the scene.
    pub wireframe: TechniqueId,
    /// A full screen triangle without depth.
    pub fullscreen_blit: TechniqueId,
    /// Per-instance visibility culling on the compute queue.
    pub compute_cull: TechniqueId,
}

impl BuiltinTechniques {
    /// The technique drawing the scene in each render mode, indexed by mode.
    pub fn render_modes(&self) -> [TechniqueId; 2] {
        [self.forward, self.wireframe]
    }

    /// The technique drawing the scene in `mode`, if the mode exists.
    pub fn render_mode(&self, mode: u32) -> Option<TechniqueId> {
        self.render_modes().get(mode as usize).copied()
    }
}

/// The declaration of the built-in techniques, ready to hand to
/// [`Techniques::on_init`](ferrite_core::renderer::pipeline::Techniques::on_init).
#[derive(Debug, Clone)]
pub struct BuiltinCatalog {
    catalog: TechniqueCatalog,
    ids: BuiltinTechniques,
}

impl BuiltinCatalog {
    /// Declares the built-in catalog for back buffers of `color_format` and a
    /// depth buffer of `depth_format`.
    pub fn new(color_format: Format, depth_format: Format) -> Self {
        let mut catalog = TechniqueCatalog::new();

        let scene_root = catalog.add_root_signature(RootSignatureDesc {
            label: Some(Cow::Borrowed("Scene")),
            parameters: vec![
                RootParameter::constants(0, 4),
                RootParameter::table([DescriptorRange::new(
                    DescriptorRangeType::Srv,
                    scene_root::MATERIAL_TEXTURES,
                    0,
                )]),
                RootParameter::cbv(1),
                RootParameter::srv(scene_root::MATERIAL_TEXTURES),
            ],
            static_samplers: vec![StaticSampler {
                register: 0,
                filter: Filter::Linear,
                address_mode: AddressMode::Wrap,
                visibility: ShaderVisibility::Pixel,
            }],
            allow_input_layout: true,
        });
        let compute_root = catalog.add_root_signature(RootSignatureDesc {
            label: Some(Cow::Borrowed("Compute")),
            parameters: vec![
                RootParameter::table([
                    DescriptorRange::new(DescriptorRangeType::Uav, 1, 0),
                    DescriptorRange::new(DescriptorRangeType::Srv, 1, 0),
                ]),
                RootParameter::constants(0, 4),
            ],
            ..Default::default()
        });

        let scene_vs = ShaderRef::new("scene", "VSMain");
        let depth_only = catalog.add_technique(TechniqueDesc {
            label: "DepthOnly".to_string(),
            root_signature: scene_root,
            pipeline: PipelineDesc::Graphics(GraphicsPipelineDesc {
                depth_format: Some(depth_format),
                ..GraphicsPipelineDesc::new(scene_vs.clone(), None)
            }),
            writes_color: false,
        });
        let forward = catalog.add_technique(TechniqueDesc {
            label: "Forward".to_string(),
            root_signature: scene_root,
            pipeline: PipelineDesc::Graphics(GraphicsPipelineDesc {
                depth_stencil: DepthStencilState {
                    depth_write: false,
                    compare: CompareFunction::LessEqual,
                    ..Default::default()
                },
                render_target_formats: vec![color_format],
                depth_format: Some(depth_format),
                ..GraphicsPipelineDesc::new(scene_vs.clone(), Some(ShaderRef::new("scene", "PSMain")))
            }),
            writes_color: true,
        });
        let wireframe = catalog.add_technique(TechniqueDesc {
            label: "Wireframe".to_string(),
            root_signature: scene_root,
            pipeline: PipelineDesc::Graphics(GraphicsPipelineDesc {
                rasterizer: RasterizerState {
                    fill_mode: FillMode::Wireframe,
                    cull_mode: CullMode::None,
                    ..Default::default()
                },
                depth_stencil: DepthStencilState {
                    depth_write: false,
                    compare: CompareFunction::LessEqual,
                    ..Default::default()
                },
                render_target_formats: vec![color_format],
                depth_format: Some(depth_format),
                ..GraphicsPipelineDesc::new(scene_vs, Some(ShaderRef::new("scene", "PSWireframe")))
            }),
            writes_color: true,
        });
        let fullscreen_blit = catalog.add_technique(TechniqueDesc {
            label: "FullscreenBlit".to_string(),
            root_signature: scene_root,
            pipeline: PipelineDesc::Graphics(GraphicsPipelineDesc {
                rasterizer: RasterizerState {
                    cull_mode: CullMode::None,
                    ..Default::default()
                },
                depth_stencil: DepthStencilState::DISABLED,
                render_target_formats: vec![color_format],
                ..GraphicsPipelineDesc::new(
                    ShaderRef::new("blit", "VSMain"),
                    Some(ShaderRef::new("blit", "PSMain")),
                )
            }),
            writes_color: true,
        });
        let compute_cull = catalog.add_technique(TechniqueDesc {
            label: "ComputeCull".to_string(),
            root_signature: compute_root,
            pipeline: PipelineDesc::Compute(ComputePipelineDesc {
                shader: ShaderRef::new("cull", "CSMain"),
            }),
            writes_color: false,
        });

        Self {
            catalog,
            ids: BuiltinTechniques {
                scene_root,
                compute_root,
                depth_only,
                forward,
                wireframe,
                fullscreen_blit,
                compute_cull,
            },
        }
    }

    /// The declarations.
    pub fn catalog(&self) -> &TechniqueCatalog {
        &self.catalog
    }

    /// The ids the declarations will be registered under.
    pub fn ids(&self) -> BuiltinTechniques {
        self.ids
    }

    /// Every shader the catalog loads, without duplicates, in declaration order.
    pub fn shaders(&self) -> Vec<(ShaderRef, ShaderStage)> {
        let mut shaders: Vec<(ShaderRef, ShaderStage)> = Vec::new();
        for technique in self.catalog.techniques() {
            for (shader, stage) in technique.pipeline.shaders() {
                if !shaders.iter().any(|(known, known_stage)| known == shader && *known_stage == stage) {
                    shaders.push((shader.clone(), stage));
                }
            }
        }
        shaders
    }
}
