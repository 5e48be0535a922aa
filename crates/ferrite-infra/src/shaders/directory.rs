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
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type CacheKey = (String, String, ShaderStage);

/// Loads precompiled byte code from `<root>/<name>.<entry_point>.<stage>.cso`.
///
/// Blobs are cached after the first load; [`ShaderProvider::reset_cache`] makes
/// the next load read the files again, which is how shader hot reload picks up
/// freshly compiled byte code.
#[derive(Debug)]
pub struct DirectoryShaderProvider {
    root: PathBuf,
    cache: Mutex<HashMap<CacheKey, ShaderBytecode>>,
}

impl DirectoryShaderProvider {
    /// Creates a provider reading from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The directory the byte code is read from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file holding one shader entry point.
    pub fn path_for(&self, name: &str, entry_point: &str, stage: ShaderStage) -> PathBuf {
        self.root
            .join(format!("{name}.{entry_point}.{}.cso", stage.as_str()))
    }

    /// The number of cached blobs.
    pub fn cached(&self) -> usize {
        lock(&self.cache).len()
    }
}

impl ShaderProvider for DirectoryShaderProvider {
    fn load(
        &self,
        name: &str,
        entry_point: &str,
        stage: ShaderStage,
    ) -> Result<ShaderBytecode, ShaderError> {
        let key = (name.to_string(), entry_point.to_string(), stage);
        if let Some(bytecode) = lock(&self.cache).get(&key) {
            return Ok(bytecode.clone());
        }

        let path = self.path_for(name, entry_point, stage);
        let bytes = std::fs::read(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => ShaderError::NotFound {
                name: name.to_string(),
                entry_point: entry_point.to_string(),
                stage,
            },
            _ => ShaderError::Io {
                path: path.display().to_string(),
                source,
            },
        })?;
        log::debug!("Loaded {} ({} bytes)", path.display(), bytes.len());

        let bytecode = ShaderBytecode::new(bytes);
        lock(&self.cache).insert(key, bytecode.clone());
        Ok(bytecode)
    }

    fn reset_cache(&self) {
        let mut cache = lock(&self.cache);
        log::info!("Dropping {} cached shader blob(s)", cache.len());
        cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_by_name_entry_point_and_stage() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("scene.VSMain.vs.cso"), [1u8, 2, 3]).expect("write blob");
        let provider = DirectoryShaderProvider::new(dir.path());

        let bytecode = provider
            .load("scene", "VSMain", ShaderStage::Vertex)
            .expect("blob exists");
        assert_eq!(bytecode.as_bytes(), &[1, 2, 3]);

        let err = provider
            .load("scene", "VSMain", ShaderStage::Pixel)
            .expect_err("no pixel blob");
        assert!(matches!(err, ShaderError::NotFound { stage: ShaderStage::Pixel, .. }));
    }

    #[test]
    fn cache_is_served_until_reset() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("cull.CSMain.cs.cso");
        fs::write(&path, [1u8]).expect("write blob");
        let provider = DirectoryShaderProvider::new(dir.path());

        provider.load("cull", "CSMain", ShaderStage::Compute).expect("blob exists");
        fs::write(&path, [2u8, 2]).expect("rewrite blob");
        let cached = provider.load("cull", "CSMain", ShaderStage::Compute).expect("cached");
        assert_eq!(cached.as_bytes(), &[1]);
        assert_eq!(provider.cached(), 1);

        provider.reset_cache();
        let reloaded = provider.load("cull", "CSMain", ShaderStage::Compute).expect("blob exists");
        assert_eq!(reloaded.as_bytes(), &[2, 2]);
    }
}
