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

//! Arguments of recorded commands.

use super::handles::{GpuVirtualAddress, NativeResourceId};
use super::resource::ResourceState;

/// The kind of hardware queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// A queue accepting graphics, compute and copy work.
    Graphics,
    /// A queue accepting compute and copy work.
    Compute,
}

impl QueueKind {
    /// A short lowercase name, used in labels and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            QueueKind::Graphics => "graphics",
            QueueKind::Compute => "compute",
        }
    }
}

/// Whether root arguments target the graphics or the compute root signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineBindPoint {
    /// The graphics root signature.
    Graphics,
    /// The compute root signature.
    Compute,
}

/// A viewport rectangle with its depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// The left edge in pixels.
    pub x: f32,
    /// The top edge in pixels.
    pub y: f32,
    /// The width in pixels.
    pub width: f32,
    /// The height in pixels.
    pub height: f32,
    /// The minimum depth.
    pub min_depth: f32,
    /// The maximum depth.
    pub max_depth: f32,
}

impl Viewport {
    /// A full-depth viewport covering `width` x `height` pixels.
    pub fn from_extent(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// A scissor rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    /// The left edge.
    pub left: i32,
    /// The top edge.
    pub top: i32,
    /// The right edge, exclusive.
    pub right: i32,
    /// The bottom edge, exclusive.
    pub bottom: i32,
}

impl ScissorRect {
    /// A rectangle covering `width` x `height` pixels.
    pub fn from_extent(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width as i32,
            bottom: height as i32,
        }
    }
}

/// How vertices are assembled into primitives for draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// A list of points.
    PointList,
    /// A list of lines.
    LineList,
    /// A list of triangles.
    #[default]
    TriangleList,
    /// A strip of triangles.
    TriangleStrip,
}

/// The width of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    #[default]
    Uint32,
}

impl IndexFormat {
    /// The size of an index in bytes.
    pub const fn size(self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// A region of a buffer bound as indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexBufferView {
    /// The address of the first index.
    pub location: GpuVirtualAddress,
    /// The size of the region in bytes.
    pub size_in_bytes: u32,
    /// The index width.
    pub format: IndexFormat,
}

impl IndexBufferView {
    /// The number of indices in the region.
    pub const fn index_count(&self) -> u32 {
        self.size_in_bytes / self.format.size()
    }
}

/// A state transition of one native resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionBarrier {
    /// The transitioned resource.
    pub resource: NativeResourceId,
    /// The state the resource is in before the barrier.
    pub before: ResourceState,
    /// The state the resource is in after the barrier.
    pub after: ResourceState,
}
