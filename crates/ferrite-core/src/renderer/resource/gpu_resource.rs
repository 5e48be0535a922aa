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

use crate::renderer::api::*;
use crate::renderer::descriptor::ResourceDescriptor;
use crate::renderer::error::{DeviceError, NativeObject, STATUS_INVALID_ARG};
use crate::renderer::traits::RenderDevice;
use crate::utils::lock;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

/// What a [`GpuResource`] allocation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A linear buffer.
    Buffer {
        /// The size in bytes.
        size: u64,
        /// The memory pool.
        heap: HeapKind,
    },
    /// A 2D texture.
    Texture {
        /// The width in texels.
        width: u32,
        /// The height in texels.
        height: u32,
        /// The texel format.
        format: Format,
    },
}

/// Weak back-references to the views created for a resource.
#[derive(Debug, Default)]
struct ResourceViews {
    rtv: Weak<ResourceDescriptor>,
    dsv: Weak<ResourceDescriptor>,
    srv: Weak<ResourceDescriptor>,
    uav: Weak<ResourceDescriptor>,
    cbv: Weak<ResourceDescriptor>,
    index_buffer: Option<IndexBufferView>,
}

impl ResourceViews {
    fn slot_mut(&mut self, kind: ViewKind) -> &mut Weak<ResourceDescriptor> {
        match kind {
            ViewKind::Rtv => &mut self.rtv,
            ViewKind::Dsv => &mut self.dsv,
            ViewKind::Srv => &mut self.srv,
            ViewKind::Uav => &mut self.uav,
            ViewKind::Cbv => &mut self.cbv,
        }
    }
}

/// A GPU-resident buffer or texture whose usage state is tracked on the CPU.
///
/// The tracked state always equals the state the native resource was last
/// transitioned to by a recorded barrier. Only
/// [`CommandList::resource_barrier`](crate::renderer::CommandList::resource_barrier)
/// changes it, and [`CommandList::discard`](crate::renderer::CommandList::discard)
/// puts it back when the barrier never reaches the GPU.
///
/// Resources are shared through [`Arc`]. Views only hold a [`Weak`] reference,
/// so they never keep their resource alive. The native allocation is released
/// when the last strong reference is dropped.
pub struct GpuResource {
    this: Weak<GpuResource>,
    device: Arc<dyn RenderDevice>,
    native: NativeResourceId,
    label: String,
    kind: ResourceKind,
    gpu_address: GpuVirtualAddress,
    state: Mutex<ResourceState>,
    views: Mutex<ResourceViews>,
}

impl GpuResource {
    /// Creates a buffer in `initial_state`.
    ///
    /// Upload and readback buffers are always created in the state their heap
    /// requires, whatever `initial_state` says.
    /// ## Errors
    /// * `DeviceError` - If the size is zero or the native allocation fails.
    pub fn create_buffer(
        device: &Arc<dyn RenderDevice>,
        descriptor: &BufferDescriptor,
        initial_state: ResourceState,
    ) -> Result<Arc<Self>, DeviceError> {
        let label = descriptor.label.as_deref().unwrap_or("buffer").to_string();
        if descriptor.size == 0 {
            return Err(DeviceError::new(
                NativeObject::Resource,
                STATUS_INVALID_ARG,
                format!("buffer '{label}' has a size of zero"),
            ));
        }

        let state = match descriptor.heap.required_state() {
            Some(required) if required != initial_state => {
                log::debug!(
                    "Buffer '{label}' lives in a {:?} heap, creating it in {required:?} instead of {initial_state:?}",
                    descriptor.heap
                );
                required
            }
            _ => initial_state,
        };

        let native = device.create_buffer(descriptor, state)?;
        let gpu_address = device.gpu_virtual_address(native);
        log::trace!("Created buffer '{label}' ({} bytes) in {state:?}", descriptor.size);

        Ok(Arc::new_cyclic(|this| Self {
            this: this.clone(),
            device: device.clone(),
            native,
            label,
            kind: ResourceKind::Buffer {
                size: descriptor.size,
                heap: descriptor.heap,
            },
            gpu_address,
            state: Mutex::new(state),
            views: Mutex::new(ResourceViews::default()),
        }))
    }

    /// Creates a 2D texture in `initial_state`.
    /// ## Errors
    /// * `DeviceError` - If an extent is zero or the native allocation fails.
    pub fn create_texture(
        device: &Arc<dyn RenderDevice>,
        descriptor: &TextureDescriptor,
        initial_state: ResourceState,
    ) -> Result<Arc<Self>, DeviceError> {
        let label = descriptor.label.as_deref().unwrap_or("texture").to_string();
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(DeviceError::new(
                NativeObject::Resource,
                STATUS_INVALID_ARG,
                format!(
                    "texture '{label}' has an empty extent {}x{}",
                    descriptor.width, descriptor.height
                ),
            ));
        }

        let native = device.create_texture(descriptor, initial_state)?;
        log::trace!(
            "Created texture '{label}' ({}x{} {:?}) in {initial_state:?}",
            descriptor.width,
            descriptor.height,
            descriptor.format
        );

        Ok(Arc::new_cyclic(|this| Self {
            this: this.clone(),
            device: device.clone(),
            native,
            label,
            kind: ResourceKind::Texture {
                width: descriptor.width,
                height: descriptor.height,
                format: descriptor.format,
            },
            gpu_address: GpuVirtualAddress::default(),
            state: Mutex::new(initial_state),
            views: Mutex::new(ResourceViews::default()),
        }))
    }

    /// The native handle of the allocation.
    pub fn native(&self) -> NativeResourceId {
        self.native
    }

    /// The debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// What the allocation is.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The size of a buffer in bytes, or `0` for textures.
    pub fn size(&self) -> u64 {
        match self.kind {
            ResourceKind::Buffer { size, .. } => size,
            ResourceKind::Texture { .. } => 0,
        }
    }

    /// The GPU virtual address of a buffer, or zero for textures.
    pub fn gpu_virtual_address(&self) -> GpuVirtualAddress {
        self.gpu_address
    }

    /// The currently tracked usage state.
    pub fn state(&self) -> ResourceState {
        *lock(&self.state)
    }

    /// Moves the tracked state to `target`.
    ///
    /// Returns the barrier to record, or `None` when the resource already is in
    /// `target`.
    pub(crate) fn transition_to(&self, target: ResourceState) -> Option<TransitionBarrier> {
        let mut state = lock(&self.state);
        if *state == target {
            return None;
        }
        let barrier = TransitionBarrier {
            resource: self.native,
            before: *state,
            after: target,
        };
        *state = target;
        Some(barrier)
    }

    /// Puts the tracked state back to `state` after a recorded barrier was
    /// thrown away with its command list.
    pub(crate) fn restore_state(&self, state: ResourceState) {
        *lock(&self.state) = state;
    }

    /// A weak reference to this resource.
    pub(crate) fn downgrade(&self) -> Weak<GpuResource> {
        self.this.clone()
    }

    /// Writes `data` into an upload buffer at `offset`.
    /// ## Errors
    /// * `DeviceError` - If the resource is not CPU-writable or the range is out of bounds.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        match self.kind {
            ResourceKind::Buffer { heap, size } if heap.is_cpu_writable() => {
                let end = offset.checked_add(data.len() as u64);
                if end.is_none_or(|end| end > size) {
                    return Err(DeviceError::new(
                        NativeObject::Resource,
                        STATUS_INVALID_ARG,
                        format!(
                            "write of {} bytes at offset {offset} overflows '{}' ({size} bytes)",
                            data.len(),
                            self.label
                        ),
                    ));
                }
                self.device.write_buffer(self.native, offset, data)
            }
            _ => Err(DeviceError::new(
                NativeObject::Resource,
                STATUS_INVALID_ARG,
                format!("'{}' is not a CPU-writable buffer", self.label),
            )),
        }
    }

    /// Returns the live view of `kind` created for this resource, if any.
    pub fn view(&self, kind: ViewKind) -> Option<Arc<ResourceDescriptor>> {
        lock(&self.views).slot_mut(kind).upgrade()
    }

    pub(crate) fn attach_view(&self, view: &Arc<ResourceDescriptor>) {
        *lock(&self.views).slot_mut(view.kind()) = Arc::downgrade(view);
    }

    /// Describes the whole buffer as an index buffer and remembers the view.
    ///
    /// Returns `None` for textures and for buffers whose size does not fit the
    /// 32-bit size of an index buffer view.
    pub fn create_index_buffer_view(&self, format: IndexFormat) -> Option<IndexBufferView> {
        let ResourceKind::Buffer { size, .. } = self.kind else {
            return None;
        };
        let Ok(size_in_bytes) = u32::try_from(size) else {
            log::warn!(
                "Buffer '{}' ({size} bytes) is too large for an index buffer view",
                self.label
            );
            return None;
        };
        let view = IndexBufferView {
            location: self.gpu_address,
            size_in_bytes,
            format,
        };
        lock(&self.views).index_buffer = Some(view);
        Some(view)
    }

    /// The index buffer view created by [`GpuResource::create_index_buffer_view`].
    pub fn index_buffer_view(&self) -> Option<IndexBufferView> {
        lock(&self.views).index_buffer
    }

    /// Forgets every view back-reference.
    ///
    /// Called when the content behind the resource is recreated; the views
    /// themselves stay valid handles until their owners drop them.
    pub fn reset_views(&self) {
        *lock(&self.views) = ResourceViews::default();
    }
}

impl fmt::Debug for GpuResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuResource")
            .field("label", &self.label)
            .field("native", &self.native)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for GpuResource {
    fn drop(&mut self) {
        log::trace!("Releasing resource '{}'", self.label);
        self.device.destroy_resource(self.native);
    }
}
