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

use ferrite_core::renderer::api::ShaderStage;
use ferrite_core::renderer::error::ShaderError;
use ferrite_core::renderer::traits::{ShaderBytecode, ShaderProvider};
use ferrite_core::utils::lock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Serves byte code registered in process.
///
/// Useful for the headless backend, which never looks inside the blobs, and for
/// tests that need to make a shader disappear or fail between two rebuilds.
#[derive(Debug, Default)]
pub struct MemoryShaderProvider {
    blobs: Mutex<HashMap<(String, String, ShaderStage), ShaderBytecode>>,
    resets: AtomicU32,
}

impl MemoryShaderProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the byte code of one entry point.
    pub fn insert(&self, name: &str, entry_point: &str, stage: ShaderStage, bytes: impl Into<Vec<u8>>) {
        lock(&self.blobs).insert(
            (name.to_string(), entry_point.to_string(), stage),
            ShaderBytecode::new(bytes.into()),
        );
    }

    /// Builder form of [`MemoryShaderProvider::insert`].
    pub fn with(self, name: &str, entry_point: &str, stage: ShaderStage, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, entry_point, stage, bytes);
        self
    }

    /// Forgets the byte code of one entry point.
    pub fn remove(&self, name: &str, entry_point: &str, stage: ShaderStage) -> bool {
        lock(&self.blobs)
            .remove(&(name.to_string(), entry_point.to_string(), stage))
            .is_some()
    }

    /// The number of times the cache was reset.
    pub fn resets(&self) -> u32 {
        self.resets.load(Ordering::Relaxed)
    }
}

impl ShaderProvider for MemoryShaderProvider {
    fn load(
        &self,
        name: &str,
        entry_point: &str,
        stage: ShaderStage,
    ) -> Result<ShaderBytecode, ShaderError> {
        lock(&self.blobs)
            .get(&(name.to_string(), entry_point.to_string(), stage))
            .cloned()
            .ok_or_else(|| ShaderError::NotFound {
                name: name.to_string(),
                entry_point: entry_point.to_string(),
                stage,
            })
    }

    fn reset_cache(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_blobs_are_reported_by_stage() {
        let provider = MemoryShaderProvider::new().with("scene", "VSMain", ShaderStage::Vertex, [7u8]);
        assert!(provider.load("scene", "VSMain", ShaderStage::Vertex).is_ok());
        assert!(provider.remove("scene", "VSMain", ShaderStage::Vertex));
        assert!(matches!(
            provider.load("scene", "VSMain", ShaderStage::Vertex),
            Err(ShaderError::NotFound { .. })
        ));
    }
}
