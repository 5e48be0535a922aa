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

//! The per-slot shader-visible descriptor heap.
//!
//! Shaders read descriptor tables from a shader-visible heap, while views are
//! created in CPU-only pools. Before every draw or dispatch that reads a table,
//! the descriptors staged for the bound root signature are copied into this
//! heap and the table base is bound on the command list.
//!
//! The heap is a bump allocator reset once per command list reuse:
//!
//! 1. [`DynamicGpuHeap::cache_root_signature`] reserves one contiguous range per
//!    descriptor table of the signature.
//! 2. [`DynamicGpuHeap::stage_descriptor_in_table`] records CPU handles and marks
//!    them dirty. Nothing is copied yet.
//! 3. [`DynamicGpuHeap::commit_root_signature`] copies the dirty descriptors and
//!    binds every table.
//! 4. [`DynamicGpuHeap::reset`] forgets everything at the top of the next reuse.
//!
//! Committed descriptors stay valid for the whole reset epoch, so a second
//! commit only copies what has been staged since the first one.

use crate::renderer::api::*;
use crate::renderer::command::CommandList;
use crate::renderer::descriptor::ResourceDescriptor;
use crate::renderer::error::{CapacityError, DeviceError, HeapError, NativeObject};
use crate::renderer::pipeline::RootSignature;
use crate::renderer::traits::RenderDevice;
use crate::utils::bits::{mask_ones, BitSet};
use std::fmt;
use std::sync::Arc;

/// The number of root parameters a root signature may declare.
pub const MAX_ROOT_PARAMETERS: usize = 64;

const POOL_NAME: &str = "dynamic GPU descriptor heap";

#[derive(Debug, Default, Clone)]
struct TableCache {
    size: u32,
    heap_offset: u32,
    staged: Vec<Option<CpuDescriptorHandle>>,
    dirty: BitSet,
}

/// A shader-visible descriptor heap owned by one command queue ring slot.
pub struct DynamicGpuHeap {
    device: Arc<dyn RenderDevice>,
    heap: NativeDescriptorHeap,
    gpu_start: GpuDescriptorHandle,
    cursor: u32,
    table_mask: u64,
    tables: Vec<TableCache>,
}

impl DynamicGpuHeap {
    /// Creates a shader-visible heap of `capacity` descriptors.
    /// ## Errors
    /// * `DeviceError` - If the native heap cannot be created or is not shader visible.
    pub fn new(device: &Arc<dyn RenderDevice>, capacity: u32) -> Result<Self, DeviceError> {
        let heap = device.create_descriptor_heap(DescriptorHeapType::CbvSrvUav, capacity, true)?;
        let Some(gpu_start) = heap.gpu_start else {
            device.destroy_descriptor_heap(heap.id);
            return Err(DeviceError::failed(
                NativeObject::DescriptorHeap,
                "the device returned a heap without a GPU handle for a shader-visible request",
            ));
        };
        Ok(Self {
            device: device.clone(),
            heap,
            gpu_start,
            cursor: 0,
            table_mask: 0,
            tables: vec![TableCache::default(); MAX_ROOT_PARAMETERS],
        })
    }

    /// The native heap, to be bound with `set_descriptor_heaps`.
    pub fn native_heap(&self) -> NativeHeapId {
        self.heap.id
    }

    /// The number of descriptors the heap holds.
    pub fn capacity(&self) -> u32 {
        self.heap.capacity
    }

    /// The number of descriptors reserved since the last reset.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// The table presence bitmask, bit `n` standing for root parameter `n`.
    pub fn table_mask(&self) -> u64 {
        self.table_mask
    }

    /// Returns `true` if a table is cached for `root_index`.
    pub fn has_table(&self, root_index: u32) -> bool {
        root_index < 64 && self.table_mask & (1 << root_index) != 0
    }

    /// The size and base handles of the table cached for `root_index`.
    pub fn table(&self, root_index: u32) -> Option<(u32, CpuDescriptorHandle, GpuDescriptorHandle)> {
        self.has_table(root_index).then(|| {
            let table = &self.tables[root_index as usize];
            (
                table.size,
                self.heap.cpu_handle(table.heap_offset),
                self.gpu_start.offset(table.heap_offset, self.heap.increment),
            )
        })
    }

    /// The number of slots of a cached table staged but not committed yet.
    pub fn dirty_count(&self, root_index: u32) -> usize {
        if self.has_table(root_index) {
            self.tables[root_index as usize].dirty.count()
        } else {
            0
        }
    }

    fn exhausted(&self, requested: u32) -> CapacityError {
        CapacityError {
            pool: POOL_NAME,
            capacity: self.heap.capacity,
            in_use: self.cursor,
            requested,
        }
    }

    /// Reserves one contiguous range per descriptor table of `root_signature`.
    ///
    /// The cached tables replace whatever was cached before. The reservation is
    /// all-or-nothing: on a capacity error neither the cursor nor the cached
    /// tables change.
    pub fn cache_root_signature(&mut self, root_signature: &RootSignature) -> Result<(), HeapError> {
        let required: u32 = root_signature.descriptor_tables().map(|(_, size)| size).sum();
        if self.cursor + required > self.heap.capacity {
            let err = self.exhausted(required);
            log::error!("Cannot cache root signature '{}': {err}", root_signature.label());
            return Err(err.into());
        }

        let mut mask = 0u64;
        for (root_index, size) in root_signature.descriptor_tables() {
            let table = &mut self.tables[root_index as usize];
            table.size = size;
            table.heap_offset = self.cursor;
            table.staged.clear();
            table.staged.resize(size as usize, None);
            table.dirty.reset_to(size as usize);
            self.cursor += size;
            mask |= 1 << root_index;
        }
        self.table_mask = mask;
        Ok(())
    }

    /// Stages `descriptor` in slot `offset` of the table cached for `root_index`.
    ///
    /// Purely CPU-side; the descriptor reaches the shader-visible heap on the next
    /// commit.
    pub fn stage_descriptor_in_table(
        &mut self,
        root_index: u32,
        offset: u32,
        descriptor: CpuDescriptorHandle,
    ) -> Result<(), HeapError> {
        if !self.has_table(root_index) {
            return Err(HeapError::TableNotCached { root_index });
        }
        let table = &mut self.tables[root_index as usize];
        if offset >= table.size {
            return Err(HeapError::OffsetOutOfRange {
                root_index,
                offset,
                size: table.size,
            });
        }
        table.staged[offset as usize] = Some(descriptor);
        table.dirty.insert(offset as usize);
        Ok(())
    }

    /// Stages a CBV, SRV or UAV view in a table slot.
    pub fn stage_view(
        &mut self,
        root_index: u32,
        offset: u32,
        view: &ResourceDescriptor,
    ) -> Result<(), HeapError> {
        if view.kind().heap_type() != DescriptorHeapType::CbvSrvUav {
            return Err(HeapError::IncompatibleView { kind: view.kind() });
        }
        if view.is_expired() {
            return Err(HeapError::ExpiredView);
        }
        self.stage_descriptor_in_table(root_index, offset, view.cpu_handle())
    }

    /// Copies every dirty staged descriptor into the heap and binds every cached
    /// table on `bind_point`.
    ///
    /// Returns the number of copied descriptors. Slots that were never staged are
    /// bound with whatever the heap holds at their position.
    pub fn commit_root_signature(&mut self, list: &mut CommandList, bind_point: PipelineBindPoint) -> u32 {
        let mut copies = 0;
        for root_index in mask_ones(self.table_mask) {
            let table = &mut self.tables[root_index as usize];
            for slot in table.dirty.ones() {
                if let Some(source) = table.staged[slot] {
                    self.device.copy_descriptors_simple(
                        1,
                        self.heap.cpu_handle(table.heap_offset + slot as u32),
                        source,
                        DescriptorHeapType::CbvSrvUav,
                    );
                    copies += 1;
                }
            }
            table.dirty.clear();

            let base = self.gpu_start.offset(table.heap_offset, self.heap.increment);
            list.set_root_descriptor_table(bind_point, root_index, base);
        }
        list.add_descriptor_copies(copies);
        copies
    }

    /// Reserves a single descriptor outside of any table.
    pub fn reserve_descriptor(&mut self) -> Result<(CpuDescriptorHandle, GpuDescriptorHandle), CapacityError> {
        if self.cursor >= self.heap.capacity {
            return Err(self.exhausted(1));
        }
        let index = self.cursor;
        self.cursor += 1;
        Ok((
            self.heap.cpu_handle(index),
            self.gpu_start.offset(index, self.heap.increment),
        ))
    }

    /// Forgets every cached table and rewinds the cursor.
    ///
    /// Must be called once per reuse of the owning ring slot, before any caching
    /// or staging.
    pub fn reset(&mut self) {
        for root_index in mask_ones(self.table_mask) {
            let table = &mut self.tables[root_index as usize];
            table.staged.clear();
            table.dirty.clear();
        }
        self.cursor = 0;
        self.table_mask = 0;
    }
}

impl fmt::Debug for DynamicGpuHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicGpuHeap")
            .field("heap", &self.heap.id)
            .field("cursor", &self.cursor)
            .field("capacity", &self.heap.capacity)
            .field("table_mask", &format_args!("{:#x}", self.table_mask))
            .finish()
    }
}

impl Drop for DynamicGpuHeap {
    fn drop(&mut self) {
        self.device.destroy_descriptor_heap(self.heap.id);
    }
}
