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

//! Logger initialization for applications built on the SDK.

use env_logger::{Builder, Env};

/// Installs an `env_logger` logger filtered at `info`, unless `RUST_LOG` says otherwise.
///
/// Returns `false` if a logger was already installed; calling this more than
/// once is harmless.
pub fn init_logging() -> bool {
    init_logging_with("info")
}

/// Installs an `env_logger` logger with `default_filter` as the fallback for `RUST_LOG`.
pub fn init_logging_with(default_filter: &str) -> bool {
    let installed = Builder::from_env(Env::default().default_filter_or(default_filter))
        .try_init()
        .is_ok();
    if !installed {
        log::debug!("A logger is already installed, keeping it");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialization_is_tolerated() {
        init_logging_with("debug");
        assert!(!init_logging());
    }
}
