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
use crate::renderer::descriptor::DescriptorHeapCollection;
use crate::renderer::error::ViewError;
use crate::renderer::resource::GpuResource;
use std::sync::{Arc, Weak};

/// A typed view of one resource, living in a slot of a [`DescriptorHeapCollection`].
///
/// A view only holds a weak reference to its resource. Creating a view for a
/// resource whose owner has already released it does nothing and returns
/// [`ViewError::Expired`]; no slot is consumed in that case.
#[derive(Debug)]
pub struct ResourceDescriptor {
    kind: ViewKind,
    cpu_handle: CpuDescriptorHandle,
    desc: ViewDesc,
    resource: Weak<GpuResource>,
}

impl ResourceDescriptor {
    /// Reserves a slot and writes a view of `resource` described by `desc` into it.
    ///
    /// The resource remembers the new view as its view of that kind.
    /// ## Errors
    /// * `ViewError::Expired` - If the resource has been released.
    /// * `ViewError::Capacity` - If the pool for this view kind is exhausted.
    pub fn create(
        heaps: &DescriptorHeapCollection,
        resource: &Weak<GpuResource>,
        desc: ViewDesc,
    ) -> Result<Arc<Self>, ViewError> {
        let Some(owner) = resource.upgrade() else {
            log::warn!("Skipping {:?} view creation: the resource has been released", desc.kind());
            return Err(ViewError::Expired);
        };

        let kind = desc.kind();
        let cpu_handle = heaps.reserve(kind.heap_type())?;
        heaps.device().create_view(owner.native(), &desc, cpu_handle);

        let view = Arc::new(Self {
            kind,
            cpu_handle,
            desc,
            resource: Arc::downgrade(&owner),
        });
        owner.attach_view(&view);
        log::trace!("Created {kind:?} view of '{}' at {cpu_handle:?}", owner.label());
        Ok(view)
    }

    /// Creates a render target view.
    pub fn create_rtv(
        heaps: &DescriptorHeapCollection,
        resource: &Weak<GpuResource>,
        desc: RenderTargetViewDesc,
    ) -> Result<Arc<Self>, ViewError> {
        Self::create(heaps, resource, ViewDesc::RenderTarget(desc))
    }

    /// Creates a depth-stencil view.
    pub fn create_dsv(
        heaps: &DescriptorHeapCollection,
        resource: &Weak<GpuResource>,
        desc: DepthStencilViewDesc,
    ) -> Result<Arc<Self>, ViewError> {
        Self::create(heaps, resource, ViewDesc::DepthStencil(desc))
    }

    /// Creates a shader resource view.
    pub fn create_srv(
        heaps: &DescriptorHeapCollection,
        resource: &Weak<GpuResource>,
        desc: ShaderResourceViewDesc,
    ) -> Result<Arc<Self>, ViewError> {
        Self::create(heaps, resource, ViewDesc::ShaderResource(desc))
    }

    /// Creates an unordered access view.
    pub fn create_uav(
        heaps: &DescriptorHeapCollection,
        resource: &Weak<GpuResource>,
        desc: UnorderedAccessViewDesc,
    ) -> Result<Arc<Self>, ViewError> {
        Self::create(heaps, resource, ViewDesc::UnorderedAccess(desc))
    }

    /// Creates a constant buffer view.
    pub fn create_cbv(
        heaps: &DescriptorHeapCollection,
        resource: &Weak<GpuResource>,
        desc: ConstantBufferViewDesc,
    ) -> Result<Arc<Self>, ViewError> {
        Self::create(heaps, resource, ViewDesc::ConstantBuffer(desc))
    }

    /// The type tag of the view.
    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    /// The CPU handle of the descriptor slot.
    pub fn cpu_handle(&self) -> CpuDescriptorHandle {
        self.cpu_handle
    }

    /// The description the view was created with.
    pub fn desc(&self) -> &ViewDesc {
        &self.desc
    }

    /// The viewed resource, if it is still alive.
    pub fn resource(&self) -> Option<Arc<GpuResource>> {
        self.resource.upgrade()
    }

    /// Returns `true` once the viewed resource has been released.
    pub fn is_expired(&self) -> bool {
        self.resource.strong_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDevice;
    use crate::renderer::descriptor::DescriptorPoolSizes;
    use crate::renderer::traits::RenderDevice;

    fn setup() -> (Arc<MockDevice>, Arc<dyn RenderDevice>, DescriptorHeapCollection) {
        let (mock, device) = MockDevice::shared();
        let heaps = DescriptorHeapCollection::new(&device, DescriptorPoolSizes::default())
            .expect("pools are created");
        (mock, device, heaps)
    }

    fn texture(device: &Arc<dyn RenderDevice>) -> Arc<GpuResource> {
        GpuResource::create_texture(
            device,
            &TextureDescriptor {
                width: 64,
                height: 64,
                usage: TextureUsage::RENDER_TARGET,
                ..Default::default()
            },
            ResourceState::RenderTarget,
        )
        .expect("texture creation succeeds")
    }

    #[test]
    fn view_is_written_and_attached_to_its_resource() {
        let (mock, device, heaps) = setup();
        let resource = texture(&device);

        let rtv = ResourceDescriptor::create_rtv(
            &heaps,
            &Arc::downgrade(&resource),
            RenderTargetViewDesc::default(),
        )
        .expect("resource is alive");

        assert_eq!(rtv.kind(), ViewKind::Rtv);
        assert_eq!(rtv.cpu_handle(), heaps.heap(DescriptorHeapType::Rtv).cpu_start);
        assert_eq!(
            mock.calls().views,
            vec![(resource.native(), ViewKind::Rtv, rtv.cpu_handle())]
        );
        let attached = resource.view(ViewKind::Rtv).expect("view is attached");
        assert!(Arc::ptr_eq(&attached, &rtv));
    }

    #[test]
    fn expired_resource_is_a_recoverable_no_op() {
        let (mock, device, heaps) = setup();
        let resource = texture(&device);
        let weak = Arc::downgrade(&resource);
        drop(resource);

        let err = ResourceDescriptor::create_srv(
            &heaps,
            &weak,
            ShaderResourceViewDesc {
                format: Format::Rgba8Unorm,
                range: ShaderResourceRange::Texture2D {
                    most_detailed_mip: 0,
                    mip_levels: 1,
                },
            },
        )
        .expect_err("the resource is gone");

        assert_eq!(err, ViewError::Expired);
        assert_eq!(heaps.in_use(DescriptorHeapType::CbvSrvUav), 0);
        assert!(mock.calls().views.is_empty());
    }

    #[test]
    fn views_do_not_keep_their_resource_alive() {
        let (_, device, heaps) = setup();
        let resource = texture(&device);
        let rtv = ResourceDescriptor::create_rtv(
            &heaps,
            &Arc::downgrade(&resource),
            RenderTargetViewDesc::default(),
        )
        .expect("resource is alive");

        assert!(!rtv.is_expired());
        drop(resource);
        assert!(rtv.is_expired());
        assert!(rtv.resource().is_none());
    }

    #[test]
    fn exhausted_pool_surfaces_a_capacity_error() {
        let (_, device) = MockDevice::shared();
        let heaps = DescriptorHeapCollection::new(
            &device,
            DescriptorPoolSizes {
                dsv: 1,
                ..Default::default()
            },
        )
        .expect("pools are created");

        let depth = GpuResource::create_texture(
            &device,
            &TextureDescriptor {
                width: 8,
                height: 8,
                format: Format::D32Float,
                usage: TextureUsage::DEPTH_STENCIL,
                ..Default::default()
            },
            ResourceState::DepthWrite,
        )
        .expect("texture creation succeeds");
        let weak = Arc::downgrade(&depth);

        ResourceDescriptor::create_dsv(&heaps, &weak, DepthStencilViewDesc::default())
            .expect("first dsv fits");
        let err = ResourceDescriptor::create_dsv(&heaps, &weak, DepthStencilViewDesc::default())
            .expect_err("pool holds a single dsv");
        assert!(matches!(err, ViewError::Capacity(_)));
    }
}
