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

//! CPU-visible descriptor pools, resource views and the per-frame
//! shader-visible descriptor heap.

mod dynamic_heap;
mod heap_collection;
mod view;

pub use self::dynamic_heap::{DynamicGpuHeap, MAX_ROOT_PARAMETERS};
pub use self::heap_collection::{DescriptorHeapCollection, DescriptorPoolSizes};
pub use self::view::ResourceDescriptor;
