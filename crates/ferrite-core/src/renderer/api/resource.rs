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

//! Defines data structures related to GPU buffers and textures.

use std::borrow::Cow;

/// The usage state a GPU resource is currently in.
///
/// Every command that reads or writes a resource expects it in a specific state.
/// Moving from one state to another requires a transition barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// The resource can be accessed by any queue and by presentation.
    #[default]
    Common,
    /// Read as a vertex buffer or a constant buffer.
    VertexAndConstantBuffer,
    /// Read as an index buffer.
    IndexBuffer,
    /// Written as a color attachment.
    RenderTarget,
    /// Read and written as an unordered access view.
    UnorderedAccess,
    /// Written as a depth-stencil attachment.
    DepthWrite,
    /// Read-only depth-stencil attachment.
    DepthRead,
    /// Read by any shader stage other than the pixel shader.
    NonPixelShaderResource,
    /// Read by the pixel shader.
    PixelShaderResource,
    /// Read by every shader stage.
    AllShaderResource,
    /// Written by a copy operation.
    CopyDest,
    /// Read by a copy operation.
    CopySource,
    /// The union of every read-only state; required for upload heaps.
    GenericRead,
}

impl ResourceState {
    /// The state a back buffer must be in to be presented.
    pub const PRESENT: ResourceState = ResourceState::Common;

    /// Returns `true` if the GPU may write to the resource in this state.
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            ResourceState::RenderTarget
                | ResourceState::UnorderedAccess
                | ResourceState::DepthWrite
                | ResourceState::CopyDest
        )
    }
}

/// The texel format of a texture or typed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Let the view inherit the format of the resource, or a raw buffer view.
    #[default]
    Unknown,
    /// 8-bit normalized RGBA.
    Rgba8Unorm,
    /// 8-bit normalized RGBA in the sRGB color space.
    Rgba8UnormSrgb,
    /// 8-bit normalized BGRA, the usual swap chain format.
    Bgra8Unorm,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 32-bit float RGBA.
    Rgba32Float,
    /// Single channel 32-bit float.
    R32Float,
    /// Single channel 32-bit unsigned integer, also used for raw buffers.
    R32Uint,
    /// Single channel 16-bit unsigned integer.
    R16Uint,
    /// 32-bit float depth.
    D32Float,
    /// 24-bit depth with 8-bit stencil.
    D24UnormS8Uint,
}

impl Format {
    /// The size of one texel in bytes, or `0` for [`Format::Unknown`].
    pub const fn bytes_per_texel(self) -> u32 {
        match self {
            Format::Unknown => 0,
            Format::R16Uint => 2,
            Format::Rgba8Unorm
            | Format::Rgba8UnormSrgb
            | Format::Bgra8Unorm
            | Format::R32Float
            | Format::R32Uint
            | Format::D32Float
            | Format::D24UnormS8Uint => 4,
            Format::Rgba16Float => 8,
            Format::Rgba32Float => 16,
        }
    }

    /// Returns `true` for depth-stencil formats.
    pub const fn is_depth(self) -> bool {
        matches!(self, Format::D32Float | Format::D24UnormS8Uint)
    }
}

/// The memory pool a resource is allocated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HeapKind {
    /// GPU-local memory, not visible to the CPU.
    #[default]
    Default,
    /// CPU-writable memory used to upload data.
    Upload,
    /// CPU-readable memory used to read results back.
    Readback,
}

impl HeapKind {
    /// The state a resource in this heap must be created in, if it is forced.
    pub const fn required_state(self) -> Option<ResourceState> {
        match self {
            HeapKind::Default => None,
            HeapKind::Upload => Some(ResourceState::GenericRead),
            HeapKind::Readback => Some(ResourceState::CopyDest),
        }
    }

    /// Returns `true` if the CPU can write into resources of this heap.
    pub const fn is_cpu_writable(self) -> bool {
        matches!(self, HeapKind::Upload)
    }
}

/// A descriptor used to create a buffer resource.
#[derive(Debug, Clone, Default)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The total size of the buffer in bytes.
    pub size: u64,
    /// The memory pool the buffer is allocated from.
    pub heap: HeapKind,
    /// Whether the buffer may be bound as an unordered access view.
    pub allow_unordered_access: bool,
}

/// A set of flags describing how a texture may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureUsage {
    bits: u32,
}

impl TextureUsage {
    /// Sampled only.
    pub const NONE: Self = Self { bits: 0 };
    /// The texture can be bound as a render target.
    pub const RENDER_TARGET: Self = Self { bits: 1 << 0 };
    /// The texture can be bound as a depth-stencil target.
    pub const DEPTH_STENCIL: Self = Self { bits: 1 << 1 };
    /// The texture can be bound as an unordered access view.
    pub const UNORDERED_ACCESS: Self = Self { bits: 1 << 2 };

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Combines two sets of flags.
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Checks whether every flag of `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }
}

impl std::ops::BitOr for TextureUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

/// An optimized clear value recorded at texture creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// A color clear value.
    Color([f32; 4]),
    /// A depth and stencil clear value.
    DepthStencil {
        /// The depth value.
        depth: f32,
        /// The stencil value.
        stencil: u8,
    },
}

/// A descriptor used to create a 2D texture resource.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label for the texture.
    pub label: Option<Cow<'a, str>>,
    /// The width in texels.
    pub width: u32,
    /// The height in texels.
    pub height: u32,
    /// The number of array slices.
    pub array_size: u16,
    /// The number of mip levels.
    pub mip_levels: u16,
    /// The texel format.
    pub format: Format,
    /// How the texture may be bound.
    pub usage: TextureUsage,
    /// The optimized clear value, if any.
    pub clear_value: Option<ClearValue>,
}

impl Default for TextureDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            array_size: 1,
            mip_levels: 1,
            format: Format::Rgba8Unorm,
            usage: TextureUsage::NONE,
            clear_value: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_aliases_common() {
        assert_eq!(ResourceState::PRESENT, ResourceState::Common);
        assert_eq!(ResourceState::default(), ResourceState::PRESENT);
    }

    #[test]
    fn upload_heaps_force_generic_read() {
        assert_eq!(
            HeapKind::Upload.required_state(),
            Some(ResourceState::GenericRead)
        );
        assert_eq!(HeapKind::Default.required_state(), None);
        assert!(HeapKind::Upload.is_cpu_writable());
        assert!(!HeapKind::Readback.is_cpu_writable());
    }

    #[test]
    fn texture_usage_combines() {
        let usage = TextureUsage::RENDER_TARGET | TextureUsage::UNORDERED_ACCESS;
        assert!(usage.contains(TextureUsage::RENDER_TARGET));
        assert!(!usage.contains(TextureUsage::DEPTH_STENCIL));
    }
}
