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

use crate::renderer::api::ShaderStage;
use crate::renderer::error::ShaderError;
use std::fmt;
use std::sync::Arc;

/// Compiled shader byte code, cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ShaderBytecode(Arc<[u8]>);

impl ShaderBytecode {
    /// Wraps a blob of byte code.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The size of the blob in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the blob is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ShaderBytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShaderBytecode({} bytes)", self.0.len())
    }
}

/// A source of compiled shaders.
///
/// Compilation itself is external; a provider hands out byte code by name, entry
/// point and stage, and may cache it until [`ShaderProvider::reset_cache`] is called.
pub trait ShaderProvider: Send + Sync + fmt::Debug + 'static {
    /// Loads the byte code of one shader entry point.
    fn load(
        &self,
        name: &str,
        entry_point: &str,
        stage: ShaderStage,
    ) -> Result<ShaderBytecode, ShaderError>;

    /// Drops every cached blob so the next [`ShaderProvider::load`] reloads it.
    fn reset_cache(&self);
}
