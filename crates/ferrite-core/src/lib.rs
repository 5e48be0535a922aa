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

//! # Ferrite Core
//!
//! Foundational crate containing the native-API contracts, core types and the
//! command-submission core of the renderer: fences, tracked GPU resources,
//! descriptor pools, the per-frame GPU-visible descriptor heap, the technique
//! registry, command lists and command queues.
//!
//! Nothing in this crate talks to a concrete graphics API. Backends live in
//! `ferrite-infra` and implement the traits found in [`renderer::traits`].

#![warn(missing_docs)]

pub mod renderer;
pub mod utils;

#[cfg(test)]
pub(crate) mod mock;
