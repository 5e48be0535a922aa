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

//! State shared between the headless device, its queue workers and its swap chains.

use crossbeam_channel::Sender;
use ferrite_core::renderer::api::*;
use ferrite_core::utils::lock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use super::queue::QueueOp;

/// What a descriptor slot currently describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorContent {
    /// The resource the view was created for.
    pub resource: NativeResourceId,
    /// The kind of view.
    pub kind: ViewKind,
}

/// An entry of the global execution log.
///
/// Every queue worker appends to the same log, so the order of entries is the
/// order in which the simulated GPU did the work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    /// A command list finished executing.
    Executed {
        /// The label of the queue.
        queue: String,
        /// The label of the list.
        list: String,
        /// The number of recorded commands.
        commands: usize,
    },
    /// A queue wrote a fence value.
    Signaled {
        /// The label of the queue.
        queue: String,
        /// The value written.
        value: u64,
    },
    /// A queue resumed after a GPU-side wait.
    Waited {
        /// The label of the queue.
        queue: String,
        /// The fence value that was awaited.
        value: u64,
    },
    /// A back buffer was presented.
    Presented {
        /// The label of the queue.
        queue: String,
        /// The presented back buffer.
        resource: NativeResourceId,
    },
}

impl ExecutionEvent {
    /// The label of the queue that produced the event.
    pub fn queue(&self) -> &str {
        match self {
            ExecutionEvent::Executed { queue, .. }
            | ExecutionEvent::Signaled { queue, .. }
            | ExecutionEvent::Waited { queue, .. }
            | ExecutionEvent::Presented { queue, .. } => queue,
        }
    }
}

/// A misuse of the native API detected by the headless backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A barrier declared a `before` state that differs from the actual one.
    #[error("[{list}] barrier on {resource:?} declares {declared:?} but the resource is in {actual:?}")]
    StateMismatch {
        /// The executing list.
        list: String,
        /// The transitioned resource.
        resource: NativeResourceId,
        /// The `before` state of the barrier.
        declared: ResourceState,
        /// The state the resource actually was in.
        actual: ResourceState,
    },
    /// A command used a resource in a state that does not allow it.
    #[error("[{list}] {operation} uses {resource:?} in {actual:?}")]
    WrongState {
        /// The executing list.
        list: String,
        /// The offending operation.
        operation: &'static str,
        /// The used resource.
        resource: NativeResourceId,
        /// The state the resource actually was in.
        actual: ResourceState,
    },
    /// A command referenced a resource that does not exist.
    #[error("[{list}] {resource:?} does not exist")]
    UnknownResource {
        /// The executing list.
        list: String,
        /// The missing resource.
        resource: NativeResourceId,
    },
    /// A CPU descriptor handle did not point into a live heap.
    #[error("descriptor handle {handle:#x} does not point into a live heap")]
    UnknownDescriptor {
        /// The raw handle.
        handle: u64,
    },
    /// A draw or dispatch was issued without a matching pipeline.
    #[error("[{list}] {operation} without a bound {expected} pipeline")]
    MissingPipeline {
        /// The executing list.
        list: String,
        /// The offending operation.
        operation: &'static str,
        /// The kind of pipeline the operation needs.
        expected: &'static str,
    },
    /// A pipeline was used with a root signature it was not built against.
    #[error("[{list}] {operation} uses a pipeline built for {expected:?} while {bound:?} is bound")]
    RootSignatureMismatch {
        /// The executing list.
        list: String,
        /// The offending operation.
        operation: &'static str,
        /// The root signature of the pipeline.
        expected: NativeRootSignatureId,
        /// The root signature bound on the pipeline's bind point.
        bound: Option<NativeRootSignatureId>,
    },
    /// A root argument addressed a parameter the bound root signature does not have.
    #[error("[{list}] root parameter {root_index} does not exist in the bound root signature")]
    RootIndexOutOfRange {
        /// The executing list.
        list: String,
        /// The addressed parameter.
        root_index: u32,
    },
    /// A command was recorded into a closed list.
    #[error("command recorded into closed list '{list}'")]
    ClosedList {
        /// The label of the list.
        list: String,
    },
    /// A list and its allocator were reset while their last submission was executing.
    #[error("command list '{list}' was reset while its previous submission was in flight")]
    ResetInFlight {
        /// The label of the list.
        list: String,
    },
    /// A back buffer was presented outside of the present state.
    #[error("back buffer {resource:?} was presented in {actual:?}")]
    PresentState {
        /// The presented back buffer.
        resource: NativeResourceId,
        /// The state it actually was in.
        actual: ResourceState,
    },
    /// A GPU-side wait did not complete in time.
    #[error("queue '{queue}' timed out waiting for fence value {value}")]
    WaitTimedOut {
        /// The label of the queue.
        queue: String,
        /// The awaited value.
        value: u64,
    },
}

#[derive(Debug)]
pub(crate) enum ResourceData {
    Buffer {
        size: u64,
        heap: HeapKind,
        bytes: Vec<u8>,
    },
    Texture {
        width: u32,
        height: u32,
        format: Format,
    },
}

#[derive(Debug)]
pub(crate) struct ResourceEntry {
    pub(crate) label: String,
    pub(crate) state: ResourceState,
    pub(crate) data: ResourceData,
}

#[derive(Debug)]
pub(crate) struct HeapEntry {
    pub(crate) heap: NativeDescriptorHeap,
    pub(crate) slots: Vec<Option<DescriptorContent>>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PipelineEntry {
    pub(crate) root_signature: NativeRootSignatureId,
    pub(crate) compute: bool,
}

/// Descriptor handles carry the heap id in their upper half.
pub(crate) const HEAP_SHIFT: u32 = 32;
pub(crate) const DESCRIPTOR_INCREMENT: u32 = 32;

pub(crate) struct DeviceState {
    next_id: AtomicU64,
    pub(crate) hang_timeout: Duration,
    pub(crate) resources: Mutex<HashMap<NativeResourceId, ResourceEntry>>,
    pub(crate) heaps: Mutex<HashMap<NativeHeapId, HeapEntry>>,
    pub(crate) root_signatures: Mutex<HashMap<NativeRootSignatureId, usize>>,
    pub(crate) pipelines: Mutex<HashMap<NativePipelineId, PipelineEntry>>,
    pub(crate) present_queue: Mutex<Option<(String, Sender<QueueOp>)>>,
    log: Mutex<Vec<ExecutionEvent>>,
    validation: Mutex<Vec<ValidationError>>,
}

impl DeviceState {
    pub(crate) fn new(hang_timeout: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            hang_timeout,
            resources: Mutex::new(HashMap::new()),
            heaps: Mutex::new(HashMap::new()),
            root_signatures: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(HashMap::new()),
            present_queue: Mutex::new(None),
            log: Mutex::new(Vec::new()),
            validation: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn record(&self, event: ExecutionEvent) {
        log::trace!("GPU timeline: {event:?}");
        lock(&self.log).push(event);
    }

    pub(crate) fn report(&self, error: ValidationError) {
        log::error!("Headless validation: {error}");
        lock(&self.validation).push(error);
    }

    pub(crate) fn execution_log(&self) -> Vec<ExecutionEvent> {
        lock(&self.log).clone()
    }

    pub(crate) fn clear_execution_log(&self) {
        lock(&self.log).clear();
    }

    pub(crate) fn validation_errors(&self) -> Vec<ValidationError> {
        lock(&self.validation).clone()
    }

    pub(crate) fn take_validation_errors(&self) -> Vec<ValidationError> {
        std::mem::take(&mut *lock(&self.validation))
    }

    /// Splits a raw descriptor handle into its heap and slot index.
    pub(crate) fn locate(handle: u64) -> (NativeHeapId, usize) {
        let heap = NativeHeapId(handle >> HEAP_SHIFT);
        let index = (handle & ((1 << HEAP_SHIFT) - 1)) / u64::from(DESCRIPTOR_INCREMENT);
        (heap, index as usize)
    }

    /// Reads the content of the descriptor slot at `handle`.
    pub(crate) fn descriptor(&self, handle: u64) -> Option<DescriptorContent> {
        let (heap, index) = Self::locate(handle);
        lock(&self.heaps)
            .get(&heap)
            .and_then(|entry| entry.slots.get(index).copied().flatten())
    }
}
