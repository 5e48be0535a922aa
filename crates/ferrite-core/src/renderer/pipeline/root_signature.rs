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

use crate::renderer::api::{NativeRootSignatureId, RootParameter, RootSignatureDesc};
use crate::renderer::descriptor::MAX_ROOT_PARAMETERS;
use crate::renderer::error::{DeviceError, NativeObject, STATUS_INVALID_ARG};
use crate::renderer::traits::RenderDevice;
use std::fmt;
use std::sync::Arc;

/// The stable identity of a registered root signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootSignatureId(pub u32);

/// A created root signature: its layout plus the native object.
pub struct RootSignature {
    id: RootSignatureId,
    desc: RootSignatureDesc<'static>,
    native: NativeRootSignatureId,
    device: Arc<dyn RenderDevice>,
}

impl RootSignature {
    /// Creates the native root signature for `desc`.
    /// ## Errors
    /// * `DeviceError` - If the layout has more than [`MAX_ROOT_PARAMETERS`]
    ///   parameters, declares an empty descriptor table, or the device rejects it.
    pub fn new(
        device: &Arc<dyn RenderDevice>,
        id: RootSignatureId,
        desc: RootSignatureDesc<'static>,
    ) -> Result<Self, DeviceError> {
        let label = desc.label.as_deref().unwrap_or("root signature");
        if desc.parameters.len() > MAX_ROOT_PARAMETERS {
            return Err(DeviceError::new(
                NativeObject::RootSignature,
                STATUS_INVALID_ARG,
                format!(
                    "'{label}' declares {} root parameters, at most {MAX_ROOT_PARAMETERS} are supported",
                    desc.parameters.len()
                ),
            ));
        }
        if let Some((index, _)) = desc.descriptor_tables().find(|(_, size)| *size == 0) {
            return Err(DeviceError::new(
                NativeObject::RootSignature,
                STATUS_INVALID_ARG,
                format!("'{label}' declares an empty descriptor table at root parameter {index}"),
            ));
        }

        let native = device.create_root_signature(&desc)?;
        Ok(Self {
            id,
            desc,
            native,
            device: device.clone(),
        })
    }

    /// The stable id.
    pub fn id(&self) -> RootSignatureId {
        self.id
    }

    /// The debug label.
    pub fn label(&self) -> &str {
        self.desc.label.as_deref().unwrap_or("root signature")
    }

    /// The full layout.
    pub fn desc(&self) -> &RootSignatureDesc<'static> {
        &self.desc
    }

    /// The root parameters, indexed by root parameter index.
    pub fn parameters(&self) -> &[RootParameter] {
        &self.desc.parameters
    }

    /// Iterates over `(root_index, table_size)` for every descriptor table.
    pub fn descriptor_tables(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.desc.descriptor_tables()
    }

    /// The native object.
    pub fn native(&self) -> NativeRootSignatureId {
        self.native
    }
}

impl fmt::Debug for RootSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootSignature")
            .field("id", &self.id)
            .field("label", &self.label())
            .field("native", &self.native)
            .field("parameters", &self.desc.parameters.len())
            .finish()
    }
}

impl Drop for RootSignature {
    fn drop(&mut self) {
        self.device.destroy_root_signature(self.native);
    }
}
