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

use crate::renderer::api::{CpuDescriptorHandle, DescriptorHeapType, NativeDescriptorHeap};
use crate::renderer::error::{CapacityError, DeviceError};
use crate::renderer::traits::RenderDevice;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// The capacity of each CPU-visible descriptor pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorPoolSizes {
    /// Render target views.
    pub rtv: u32,
    /// Depth-stencil views.
    pub dsv: u32,
    /// Constant buffer, shader resource and unordered access views.
    pub cbv_srv_uav: u32,
}

impl Default for DescriptorPoolSizes {
    fn default() -> Self {
        Self {
            rtv: 32,
            dsv: 5,
            cbv_srv_uav: 256,
        }
    }
}

/// One append-only pool backed by a CPU-only native heap.
struct DescriptorPool {
    heap: NativeDescriptorHeap,
    cursor: AtomicU32,
}

impl DescriptorPool {
    fn reserve(&self) -> Result<CpuDescriptorHandle, CapacityError> {
        let capacity = self.heap.capacity;
        self.cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                (cursor < capacity).then_some(cursor + 1)
            })
            .map(|index| self.heap.cpu_handle(index))
            .map_err(|in_use| CapacityError {
                pool: CapacityError::pool_name(self.heap.heap_type),
                capacity,
                in_use,
                requested: 1,
            })
    }

    fn in_use(&self) -> u32 {
        self.cursor.load(Ordering::Acquire)
    }
}

/// The process-lifetime allocator of CPU-visible view descriptors.
///
/// Three disjoint fixed-capacity pools (RTV, DSV and CBV/SRV/UAV) hand out one
/// slot per view. Slots are never released individually: a descriptor keeps its
/// identity until the collection is dropped, and an exhausted pool stays
/// exhausted.
///
/// The collection is an explicit context object; share it through an [`Arc`].
pub struct DescriptorHeapCollection {
    device: Arc<dyn RenderDevice>,
    rtv: DescriptorPool,
    dsv: DescriptorPool,
    cbv_srv_uav: DescriptorPool,
}

impl DescriptorHeapCollection {
    /// Creates the three native pools.
    /// ## Errors
    /// * `DeviceError` - If a native heap cannot be created.
    pub fn new(
        device: &Arc<dyn RenderDevice>,
        sizes: DescriptorPoolSizes,
    ) -> Result<Self, DeviceError> {
        let pool = |heap_type: DescriptorHeapType, capacity: u32| -> Result<DescriptorPool, DeviceError> {
            Ok(DescriptorPool {
                heap: device.create_descriptor_heap(heap_type, capacity, false)?,
                cursor: AtomicU32::new(0),
            })
        };

        let collection = Self {
            device: device.clone(),
            rtv: pool(DescriptorHeapType::Rtv, sizes.rtv)?,
            dsv: pool(DescriptorHeapType::Dsv, sizes.dsv)?,
            cbv_srv_uav: pool(DescriptorHeapType::CbvSrvUav, sizes.cbv_srv_uav)?,
        };
        log::info!(
            "Descriptor pools created (RTV: {}, DSV: {}, CBV/SRV/UAV: {})",
            sizes.rtv,
            sizes.dsv,
            sizes.cbv_srv_uav
        );
        Ok(collection)
    }

    fn pool(&self, heap_type: DescriptorHeapType) -> &DescriptorPool {
        match heap_type {
            DescriptorHeapType::Rtv => &self.rtv,
            DescriptorHeapType::Dsv => &self.dsv,
            DescriptorHeapType::CbvSrvUav => &self.cbv_srv_uav,
        }
    }

    /// Reserves the next render target view slot.
    pub fn reserve_rtv(&self) -> Result<CpuDescriptorHandle, CapacityError> {
        self.reserve(DescriptorHeapType::Rtv)
    }

    /// Reserves the next depth-stencil view slot.
    pub fn reserve_dsv(&self) -> Result<CpuDescriptorHandle, CapacityError> {
        self.reserve(DescriptorHeapType::Dsv)
    }

    /// Reserves the next constant buffer, shader resource or unordered access view slot.
    pub fn reserve_srv_uav_cbv(&self) -> Result<CpuDescriptorHandle, CapacityError> {
        self.reserve(DescriptorHeapType::CbvSrvUav)
    }

    /// Reserves the next slot of the pool for `heap_type`.
    ///
    /// The Nth reservation returns the pool base offset by `N - 1` descriptor
    /// increments. Once the pool is full every reservation fails.
    pub fn reserve(&self, heap_type: DescriptorHeapType) -> Result<CpuDescriptorHandle, CapacityError> {
        self.pool(heap_type).reserve().inspect_err(|err| {
            log::error!("{err}");
        })
    }

    /// The number of slots already handed out by a pool.
    pub fn in_use(&self, heap_type: DescriptorHeapType) -> u32 {
        self.pool(heap_type).in_use()
    }

    /// The capacity of a pool.
    pub fn capacity(&self, heap_type: DescriptorHeapType) -> u32 {
        self.pool(heap_type).heap.capacity
    }

    /// The native heap behind a pool.
    pub fn heap(&self, heap_type: DescriptorHeapType) -> &NativeDescriptorHeap {
        &self.pool(heap_type).heap
    }

    /// The device the pools were created on.
    pub fn device(&self) -> &Arc<dyn RenderDevice> {
        &self.device
    }
}

impl fmt::Debug for DescriptorHeapCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorHeapCollection")
            .field("rtv", &(self.rtv.in_use(), self.rtv.heap.capacity))
            .field("dsv", &(self.dsv.in_use(), self.dsv.heap.capacity))
            .field(
                "cbv_srv_uav",
                &(self.cbv_srv_uav.in_use(), self.cbv_srv_uav.heap.capacity),
            )
            .finish()
    }
}

impl Drop for DescriptorHeapCollection {
    fn drop(&mut self) {
        for pool in [&self.rtv, &self.dsv, &self.cbv_srv_uav] {
            self.device.destroy_descriptor_heap(pool.heap.id);
        }
    }
}
