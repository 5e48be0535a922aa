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

//! Pipeline state descriptions.
//!
//! [`PipelineDesc`] is what a technique declares: shaders by name plus the
//! fixed-function state. The `Native*PipelineDesc` structs are what the device
//! receives once the shader byte code has been loaded and the root signature
//! created.

use super::handles::NativeRootSignatureId;
use super::resource::Format;
use crate::renderer::traits::ShaderBytecode;

/// A programmable stage of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// The vertex shader stage.
    Vertex,
    /// The pixel shader stage.
    Pixel,
    /// The compute shader stage.
    Compute,
}

impl ShaderStage {
    /// A short lowercase name, used in file names and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs",
            ShaderStage::Pixel => "ps",
            ShaderStage::Compute => "cs",
        }
    }
}

/// Names a shader entry point to be fetched from the shader provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderRef {
    /// The shader name, usually the source file stem.
    pub name: String,
    /// The entry point function.
    pub entry_point: String,
}

impl ShaderRef {
    /// Creates a new shader reference.
    pub fn new(name: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry_point: entry_point.into(),
        }
    }
}

/// The blending mode of the color attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Overwrite the destination.
    #[default]
    Opaque,
    /// Standard `src * a + dst * (1 - a)` blending.
    AlphaBlend,
    /// `src + dst` blending.
    Additive,
}

/// How polygons are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    /// Fill the triangle interior.
    #[default]
    Solid,
    /// Draw triangle edges only.
    Wireframe,
}

/// Which faces are culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Nothing is culled.
    None,
    /// Front faces are culled.
    Front,
    /// Back faces are culled.
    #[default]
    Back,
}

/// The rasterizer state of a graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RasterizerState {
    /// The polygon fill mode.
    pub fill_mode: FillMode,
    /// The culling mode.
    pub cull_mode: CullMode,
    /// Whether counter-clockwise triangles are front facing.
    pub front_counter_clockwise: bool,
}

/// The comparison used by the depth test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// The test never passes.
    Never,
    /// Passes if the new value is less than the stored one.
    #[default]
    Less,
    /// Passes if the new value is less than or equal to the stored one.
    LessEqual,
    /// Passes if the new value is greater than the stored one.
    Greater,
    /// The test always passes.
    Always,
}

/// The depth-stencil state of a graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    /// Whether the depth test is enabled.
    pub depth_test: bool,
    /// Whether passing fragments write their depth.
    pub depth_write: bool,
    /// The depth comparison.
    pub compare: CompareFunction,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            compare: CompareFunction::Less,
        }
    }
}

impl DepthStencilState {
    /// A state with the depth test disabled.
    pub const DISABLED: Self = Self {
        depth_test: false,
        depth_write: false,
        compare: CompareFunction::Always,
    };
}

/// The class of primitives a graphics pipeline assembles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopologyType {
    /// Points.
    Point,
    /// Lines.
    Line,
    /// Triangles.
    #[default]
    Triangle,
}

/// One attribute of the vertex input layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputElement {
    /// The HLSL semantic name.
    pub semantic: String,
    /// The semantic index.
    pub semantic_index: u32,
    /// The attribute format.
    pub format: Format,
    /// The vertex buffer slot.
    pub input_slot: u32,
    /// The byte offset inside the vertex.
    pub offset: u32,
}

/// The declaration of a graphics pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphicsPipelineDesc {
    /// The vertex shader.
    pub vertex: ShaderRef,
    /// The pixel shader; `None` for depth-only pipelines.
    pub pixel: Option<ShaderRef>,
    /// The vertex input layout.
    pub input_layout: Vec<InputElement>,
    /// The blending mode.
    pub blend: BlendMode,
    /// The rasterizer state.
    pub rasterizer: RasterizerState,
    /// The depth-stencil state.
    pub depth_stencil: DepthStencilState,
    /// The formats of the color attachments.
    pub render_target_formats: Vec<Format>,
    /// The format of the depth attachment, if any.
    pub depth_format: Option<Format>,
    /// The primitive class.
    pub topology: PrimitiveTopologyType,
    /// The multisample count.
    pub sample_count: u32,
}

impl GraphicsPipelineDesc {
    /// Creates a pipeline with default fixed-function state and no attachments.
    pub fn new(vertex: ShaderRef, pixel: Option<ShaderRef>) -> Self {
        Self {
            vertex,
            pixel,
            input_layout: Vec::new(),
            blend: BlendMode::default(),
            rasterizer: RasterizerState::default(),
            depth_stencil: DepthStencilState::default(),
            render_target_formats: Vec::new(),
            depth_format: None,
            topology: PrimitiveTopologyType::default(),
            sample_count: 1,
        }
    }
}

/// The declaration of a compute pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComputePipelineDesc {
    /// The compute shader.
    pub shader: ShaderRef,
}

/// Either kind of pipeline declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PipelineDesc {
    /// A rasterization pipeline.
    Graphics(GraphicsPipelineDesc),
    /// A compute pipeline.
    Compute(ComputePipelineDesc),
}

impl PipelineDesc {
    /// The shaders the pipeline needs, with their stage.
    pub fn shaders(&self) -> Vec<(&ShaderRef, ShaderStage)> {
        match self {
            PipelineDesc::Graphics(desc) => {
                let mut shaders = vec![(&desc.vertex, ShaderStage::Vertex)];
                if let Some(pixel) = &desc.pixel {
                    shaders.push((pixel, ShaderStage::Pixel));
                }
                shaders
            }
            PipelineDesc::Compute(desc) => vec![(&desc.shader, ShaderStage::Compute)],
        }
    }

    /// Returns `true` for compute pipelines.
    pub fn is_compute(&self) -> bool {
        matches!(self, PipelineDesc::Compute(_))
    }
}

/// A graphics pipeline as handed to the device, with its byte code resolved.
#[derive(Debug, Clone, Copy)]
pub struct NativeGraphicsPipelineDesc<'a> {
    /// A debug label.
    pub label: &'a str,
    /// The native root signature the pipeline is built against.
    pub root_signature: NativeRootSignatureId,
    /// The vertex shader byte code.
    pub vertex: &'a ShaderBytecode,
    /// The pixel shader byte code.
    pub pixel: Option<&'a ShaderBytecode>,
    /// The fixed-function state.
    pub state: &'a GraphicsPipelineDesc,
}

/// A compute pipeline as handed to the device, with its byte code resolved.
#[derive(Debug, Clone, Copy)]
pub struct NativeComputePipelineDesc<'a> {
    /// A debug label.
    pub label: &'a str,
    /// The native root signature the pipeline is built against.
    pub root_signature: NativeRootSignatureId,
    /// The compute shader byte code.
    pub shader: &'a ShaderBytecode,
}
