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

//! Descriptor heap kinds and view descriptions.

use super::resource::Format;

/// The kind of descriptors a heap stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapType {
    /// Render target views.
    Rtv,
    /// Depth-stencil views.
    Dsv,
    /// Constant buffer, shader resource and unordered access views.
    CbvSrvUav,
}

impl DescriptorHeapType {
    /// Returns `true` if heaps of this type can be made visible to shaders.
    pub const fn can_be_shader_visible(self) -> bool {
        matches!(self, DescriptorHeapType::CbvSrvUav)
    }
}

/// The type tag of a resource view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Render target view.
    Rtv,
    /// Depth-stencil view.
    Dsv,
    /// Shader resource view.
    Srv,
    /// Unordered access view.
    Uav,
    /// Constant buffer view.
    Cbv,
}

impl ViewKind {
    /// The heap type views of this kind are allocated from.
    pub const fn heap_type(self) -> DescriptorHeapType {
        match self {
            ViewKind::Rtv => DescriptorHeapType::Rtv,
            ViewKind::Dsv => DescriptorHeapType::Dsv,
            ViewKind::Srv | ViewKind::Uav | ViewKind::Cbv => DescriptorHeapType::CbvSrvUav,
        }
    }
}

/// Describes how a resource is viewed as a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderTargetViewDesc {
    /// The view format; [`Format::Unknown`] inherits the resource format.
    pub format: Format,
    /// The mip level to render into.
    pub mip_slice: u32,
}

/// Describes how a resource is viewed as a depth-stencil target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepthStencilViewDesc {
    /// The view format; [`Format::Unknown`] inherits the resource format.
    pub format: Format,
    /// The mip level to render into.
    pub mip_slice: u32,
    /// Whether depth writes are disabled through this view.
    pub read_only_depth: bool,
}

/// The subresource range a shader resource view covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderResourceRange {
    /// A range of buffer elements.
    Buffer {
        /// The first element visible through the view.
        first_element: u64,
        /// The number of elements visible through the view.
        num_elements: u32,
        /// The stride of a structured element, or `0` for typed and raw views.
        structure_byte_stride: u32,
        /// Whether the buffer is viewed as a raw byte address buffer.
        raw: bool,
    },
    /// A range of mip levels of a 2D texture.
    Texture2D {
        /// The most detailed mip visible through the view.
        most_detailed_mip: u32,
        /// The number of mips, or `u32::MAX` for all remaining mips.
        mip_levels: u32,
    },
}

/// Describes how a resource is viewed by shaders for reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderResourceViewDesc {
    /// The view format.
    pub format: Format,
    /// The covered range.
    pub range: ShaderResourceRange,
}

/// The subresource range an unordered access view covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnorderedAccessRange {
    /// A range of buffer elements.
    Buffer {
        /// The first element visible through the view.
        first_element: u64,
        /// The number of elements visible through the view.
        num_elements: u32,
        /// The stride of a structured element, or `0` for typed and raw views.
        structure_byte_stride: u32,
    },
    /// A single mip level of a 2D texture.
    Texture2D {
        /// The mip level visible through the view.
        mip_slice: u32,
    },
}

/// Describes how a resource is viewed by shaders for reading and writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnorderedAccessViewDesc {
    /// The view format.
    pub format: Format,
    /// The covered range.
    pub range: UnorderedAccessRange,
}

/// Describes a region of a buffer viewed as constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantBufferViewDesc {
    /// The offset from the start of the buffer, a multiple of 256.
    pub offset: u64,
    /// The size of the view in bytes, a multiple of 256.
    pub size: u32,
}

/// The required alignment of constant buffer views, in bytes.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// A view description of any kind, as handed to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDesc {
    /// A render target view.
    RenderTarget(RenderTargetViewDesc),
    /// A depth-stencil view.
    DepthStencil(DepthStencilViewDesc),
    /// A shader resource view.
    ShaderResource(ShaderResourceViewDesc),
    /// An unordered access view.
    UnorderedAccess(UnorderedAccessViewDesc),
    /// A constant buffer view.
    ConstantBuffer(ConstantBufferViewDesc),
}

impl ViewDesc {
    /// The type tag of the described view.
    pub const fn kind(&self) -> ViewKind {
        match self {
            ViewDesc::RenderTarget(_) => ViewKind::Rtv,
            ViewDesc::DepthStencil(_) => ViewKind::Dsv,
            ViewDesc::ShaderResource(_) => ViewKind::Srv,
            ViewDesc::UnorderedAccess(_) => ViewKind::Uav,
            ViewDesc::ConstantBuffer(_) => ViewKind::Cbv,
        }
    }
}
