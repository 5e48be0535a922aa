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

//! Sizing and start-up options of the [`Backend`](crate::Backend).
//!
//! The configuration is plain data stored as RON. Every field has a default, so
//! a file only needs to name what it changes:
//!
//! ```ron
//! (
//!     command_ring_size: 3,
//!     slot_reuse: External,
//! )
//! ```

use ferrite_core::renderer::command::{CommandQueueDesc, SlotReusePolicy};
use ferrite_core::renderer::descriptor::DescriptorPoolSizes;
use ferrite_core::renderer::api::QueueKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// An error raised while loading or validating a [`BackendConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file '{path}'")]
    Io {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The text is not a valid RON configuration.
    #[error("invalid configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// The configuration could not be serialized.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] ron::Error),
    /// A queue needs at least one ring slot.
    #[error("command_ring_size must be at least 1")]
    ZeroRingSize,
    /// The swap chain needs at least one back buffer.
    #[error("back_buffer_count must be at least 1")]
    ZeroBackBuffers,
    /// Every back buffer in flight needs its own ring slot.
    #[error("back_buffer_count ({back_buffers}) exceeds command_ring_size ({ring_size})")]
    BackBuffersExceedRing {
        /// The configured number of back buffers.
        back_buffers: usize,
        /// The configured ring size.
        ring_size: usize,
    },
    /// A descriptor heap was configured without room for a single descriptor.
    #[error("{0} must be at least 1")]
    ZeroCapacity(&'static str),
}

/// Sizing and start-up options of the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// The number of swap chain back buffers.
    pub back_buffer_count: usize,
    /// The number of ring slots of each command queue.
    pub command_ring_size: usize,
    /// The capacity of the render target view pool.
    pub rtv_capacity: u32,
    /// The capacity of the depth-stencil view pool.
    pub dsv_capacity: u32,
    /// The capacity of the CBV/SRV/UAV pool.
    pub cbv_srv_uav_capacity: u32,
    /// The shader-visible descriptors of each ring slot.
    pub dynamic_heap_capacity: u32,
    /// The width of the back buffers in pixels.
    pub width: u32,
    /// The height of the back buffers in pixels.
    pub height: u32,
    /// How ring slots are protected against reuse while in flight.
    pub slot_reuse: SlotReusePolicy,
    /// The render mode selected at start-up.
    pub initial_render_mode: u32,
    /// Whether compute work gets its own hardware queue.
    pub enable_compute_queue: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        let pools = DescriptorPoolSizes::default();
        Self {
            back_buffer_count: 2,
            command_ring_size: 6,
            rtv_capacity: pools.rtv,
            dsv_capacity: pools.dsv,
            cbv_srv_uav_capacity: pools.cbv_srv_uav,
            dynamic_heap_capacity: 128,
            width: 1280,
            height: 720,
            slot_reuse: SlotReusePolicy::WaitForSlotFence,
            initial_render_mode: 0,
            enable_compute_queue: true,
        }
    }
}

impl BackendConfig {
    /// Parses and validates a configuration from RON text.
    /// ## Errors
    /// * `ConfigError::Parse` - If the text is not valid RON for this type.
    /// * Any validation error of [`BackendConfig::validate`].
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a RON configuration file.
    /// ## Errors
    /// * `ConfigError::Io` - If the file cannot be read.
    /// * Any error of [`BackendConfig::from_ron_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ron_str(&text)?;
        log::info!("Loaded backend configuration from '{}'", path.display());
        Ok(config)
    }

    /// Serializes the configuration as pretty-printed RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Checks the sizing constraints the backend relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_ring_size == 0 {
            return Err(ConfigError::ZeroRingSize);
        }
        if self.back_buffer_count == 0 {
            return Err(ConfigError::ZeroBackBuffers);
        }
        if self.back_buffer_count > self.command_ring_size {
            return Err(ConfigError::BackBuffersExceedRing {
                back_buffers: self.back_buffer_count,
                ring_size: self.command_ring_size,
            });
        }
        let capacities = [
            ("rtv_capacity", self.rtv_capacity),
            ("dsv_capacity", self.dsv_capacity),
            ("cbv_srv_uav_capacity", self.cbv_srv_uav_capacity),
            ("dynamic_heap_capacity", self.dynamic_heap_capacity),
        ];
        if let Some((name, _)) = capacities.iter().find(|(_, capacity)| *capacity == 0) {
            return Err(ConfigError::ZeroCapacity(name));
        }
        Ok(())
    }

    /// The sizes of the CPU-visible descriptor pools.
    pub fn pool_sizes(&self) -> DescriptorPoolSizes {
        DescriptorPoolSizes {
            rtv: self.rtv_capacity,
            dsv: self.dsv_capacity,
            cbv_srv_uav: self.cbv_srv_uav_capacity,
        }
    }

    /// The description of a command queue of the given kind.
    pub fn queue_desc(&self, label: &str, kind: QueueKind) -> CommandQueueDesc {
        CommandQueueDesc {
            ring_size: self.command_ring_size,
            dynamic_heap_capacity: self.dynamic_heap_capacity,
            slot_reuse: self.slot_reuse,
            ..CommandQueueDesc::new(label, kind)
        }
    }
}
