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

//! The command queue and its ring of recording slots.
//!
//! A queue owns N interchangeable slots, each made of a command list (with its
//! allocator) and a [`DynamicGpuHeap`]. Both rotate on the same index, so a slot
//! is reused as a whole. Each slot moves through:
//!
//! ```text
//! Idle -> Recording -> Submitted -> Signaled(v) -> Recording -> ...
//! ```
//!
//! A slot may only be reset once the GPU is done with it. With
//! [`SlotReusePolicy::WaitForSlotFence`] the queue enforces this itself by waiting
//! for the fence value that covers the slot. With [`SlotReusePolicy::External`]
//! the caller is trusted to pace frames with its own fence waits.

use super::fence::Fence;
use super::list::CommandList;
use super::stats::CommandListStats;
use crate::renderer::api::QueueKind;
use crate::renderer::descriptor::{DynamicGpuHeap, ResourceDescriptor};
use crate::renderer::error::{
    CommandError, DeviceError, HeapError, NativeObject, RenderError, STATUS_INVALID_ARG,
};
use crate::renderer::pipeline::{TechniqueId, Techniques};
use crate::renderer::traits::{NativeQueue, RenderDevice};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How a queue makes sure a ring slot is no longer in use by the GPU before
/// resetting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SlotReusePolicy {
    /// Block on the fence value covering the slot's previous submission.
    #[default]
    WaitForSlotFence,
    /// Never wait; the caller paces frames so the slot is known to be idle.
    External,
}

/// Where a ring slot is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Never used.
    Idle,
    /// The slot's list is open.
    Recording,
    /// The slot's list was executed; no signal covers it yet.
    Submitted,
    /// The slot's list was executed and completes when the fence reaches the value.
    Signaled(u64),
}

/// How to build a [`CommandQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandQueueDesc {
    /// The debug label.
    pub label: String,
    /// The kind of hardware queue.
    pub kind: QueueKind,
    /// The number of ring slots.
    pub ring_size: usize,
    /// The capacity of each slot's shader-visible heap.
    pub dynamic_heap_capacity: u32,
    /// How slots are protected against reuse while in flight.
    pub slot_reuse: SlotReusePolicy,
}

impl CommandQueueDesc {
    /// A queue of six slots with 128 shader-visible descriptors each.
    pub fn new(label: impl Into<String>, kind: QueueKind) -> Self {
        Self {
            label: label.into(),
            kind,
            ring_size: 6,
            dynamic_heap_capacity: 128,
            slot_reuse: SlotReusePolicy::default(),
        }
    }
}

struct RingSlot {
    list: CommandList,
    heap: DynamicGpuHeap,
    state: SlotState,
}

/// A hardware queue with its fence and its ring of recording slots.
pub struct CommandQueue {
    label: String,
    kind: QueueKind,
    native: Box<dyn NativeQueue>,
    fence: Arc<Fence>,
    slots: Vec<RingSlot>,
    active: usize,
    policy: SlotReusePolicy,
}

impl CommandQueue {
    /// Creates the native queue, its fence and every ring slot.
    /// ## Errors
    /// * `DeviceError` - If the ring is empty or a native object cannot be created.
    pub fn new(device: &Arc<dyn RenderDevice>, desc: CommandQueueDesc) -> Result<Self, DeviceError> {
        if desc.ring_size == 0 {
            return Err(DeviceError::new(
                NativeObject::CommandQueue,
                STATUS_INVALID_ARG,
                format!("queue '{}' needs at least one ring slot", desc.label),
            ));
        }

        let native = device.create_command_queue(desc.kind, &desc.label)?;
        let fence = Arc::new(Fence::new(device.as_ref())?);
        let slots = (0..desc.ring_size)
            .map(|index| {
                let label = format!("{} list {index}", desc.label);
                let native_list = device.create_command_list(desc.kind, &label)?;
                Ok(RingSlot {
                    list: CommandList::new(label, native_list),
                    heap: DynamicGpuHeap::new(device, desc.dynamic_heap_capacity)?,
                    state: SlotState::Idle,
                })
            })
            .collect::<Result<Vec<_>, DeviceError>>()?;

        log::info!(
            "Created {} queue '{}' with {} ring slot(s) ({:?})",
            desc.kind.as_str(),
            desc.label,
            desc.ring_size,
            desc.slot_reuse
        );
        Ok(Self {
            label: desc.label,
            kind: desc.kind,
            native,
            fence,
            active: desc.ring_size - 1,
            slots,
            policy: desc.slot_reuse,
        })
    }

    /// The debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The kind of hardware queue.
    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    /// The queue's fence, shareable with other queues for GPU waits.
    pub fn fence(&self) -> &Arc<Fence> {
        &self.fence
    }

    /// The number of ring slots.
    pub fn ring_size(&self) -> usize {
        self.slots.len()
    }

    /// The index of the active ring slot.
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// The state of ring slot `index`.
    pub fn slot_state(&self, index: usize) -> Option<SlotState> {
        self.slots.get(index).map(|slot| slot.state)
    }

    /// The slot reuse policy.
    pub fn slot_reuse_policy(&self) -> SlotReusePolicy {
        self.policy
    }

    /// The last fence value the GPU has reached.
    pub fn completed_value(&self) -> u64 {
        self.fence.completed_value()
    }

    /// The last fence value handed out by [`CommandQueue::signal`].
    pub fn last_signaled_value(&self) -> u64 {
        self.fence.last_issued_value()
    }

    /// Advances to the next ring slot and opens it for recording.
    ///
    /// Resets the slot's allocator, command list and shader-visible heap, and
    /// binds that heap on the list.
    /// ## Errors
    /// * `CommandError::SlotStillRecording` - If the next slot was never executed.
    /// * `CommandError::Device` - If a wait or the native reset fails.
    pub fn reset_active_cl(&mut self) -> Result<SlotRecorder<'_>, CommandError> {
        let next = (self.active + 1) % self.slots.len();
        match (self.slots[next].state, self.policy) {
            (SlotState::Recording, _) => {
                return Err(CommandError::SlotStillRecording {
                    queue: self.label.clone(),
                    slot: next,
                });
            }
            (SlotState::Submitted, SlotReusePolicy::WaitForSlotFence) => {
                let value = self.signal()?;
                self.fence.wait_on_cpu(value)?;
            }
            (SlotState::Signaled(value), SlotReusePolicy::WaitForSlotFence) => {
                if self.fence.wait_on_cpu(value)? {
                    log::debug!("Queue '{}' waited for slot {next} (fence value {value})", self.label);
                }
            }
            (SlotState::Signaled(value), SlotReusePolicy::External) if !self.fence.is_complete(value) => {
                log::warn!(
                    "Queue '{}' reuses slot {next} before fence value {value} completed",
                    self.label
                );
            }
            _ => {}
        }

        let slot = &mut self.slots[next];
        slot.list.reset()?;
        slot.heap.reset();
        slot.list.set_descriptor_heap(&slot.heap);
        slot.state = SlotState::Recording;
        self.active = next;
        Ok(SlotRecorder {
            list: &mut slot.list,
            heap: &mut slot.heap,
        })
    }

    /// Returns the active slot while it is recording.
    pub fn active_cl(&mut self) -> Result<SlotRecorder<'_>, CommandError> {
        let slot = &mut self.slots[self.active];
        if slot.state != SlotState::Recording {
            return Err(CommandError::NotRecording {
                label: slot.list.label().to_string(),
            });
        }
        Ok(SlotRecorder {
            list: &mut slot.list,
            heap: &mut slot.heap,
        })
    }

    /// Closes the active list without submitting it and hands the slot back to the ring.
    ///
    /// Used when recording is abandoned half-way; nothing reaches the GPU and
    /// the barriers the list recorded are rolled back on the tracked states.
    pub fn discard_active_cl(&mut self) -> Result<(), CommandError> {
        let slot = &mut self.slots[self.active];
        if slot.state != SlotState::Recording {
            return Err(CommandError::NotRecording {
                label: slot.list.label().to_string(),
            });
        }
        slot.list.discard()?;
        slot.state = SlotState::Idle;
        log::debug!("Queue '{}' discarded slot {}", self.label, self.active);
        Ok(())
    }

    /// Closes the active list and submits it to the hardware queue.
    ///
    /// Returns the statistics of the submitted list.
    pub fn execute_active_cl(&mut self) -> Result<CommandListStats, CommandError> {
        let slot = &mut self.slots[self.active];
        if slot.state != SlotState::Recording {
            return Err(CommandError::NotRecording {
                label: slot.list.label().to_string(),
            });
        }
        slot.list.close()?;
        self.native
            .execute_command_lists(&mut [slot.list.native_mut()])?;
        slot.state = SlotState::Submitted;
        log::trace!("Queue '{}' executed slot {}", self.label, self.active);
        Ok(slot.list.stats())
    }

    /// Asks the GPU to write a new fence value once all work submitted so far
    /// has completed, and returns that value.
    ///
    /// Values are strictly increasing.
    pub fn signal(&mut self) -> Result<u64, CommandError> {
        let value = self.fence.next_value();
        self.native.signal(self.fence.native(), value)?;
        for slot in &mut self.slots {
            if slot.state == SlotState::Submitted {
                slot.state = SlotState::Signaled(value);
            }
        }
        log::trace!("Queue '{}' signaled fence value {value}", self.label);
        Ok(value)
    }

    /// Blocks until the queue's fence reaches `value`. Returns at once if it already has.
    pub fn wait_on_cpu(&self, value: u64) -> Result<(), DeviceError> {
        self.fence.wait_on_cpu(value).map(drop)
    }

    /// Makes work submitted to this queue after this call wait on the GPU until
    /// `fence` reaches `value`. The calling thread is not blocked.
    pub fn wait_on_gpu(&self, fence: &Fence, value: u64) -> Result<(), DeviceError> {
        log::trace!("Queue '{}' waits on GPU for fence value {value}", self.label);
        self.native.wait(fence.native(), value)
    }

    /// Signals and waits for the new value: every prior submission has completed
    /// when this returns.
    pub fn flush(&mut self) -> Result<u64, CommandError> {
        let value = self.signal()?;
        self.wait_on_cpu(value)?;
        log::debug!("Queue '{}' flushed at fence value {value}", self.label);
        Ok(value)
    }

    fn has_pending_work(&self) -> bool {
        self.slots.iter().any(|slot| match slot.state {
            SlotState::Submitted => true,
            SlotState::Signaled(value) => !self.fence.is_complete(value),
            SlotState::Idle | SlotState::Recording => false,
        })
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("active", &self.active)
            .field("fence", &self.fence)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        if self.has_pending_work() {
            if let Err(err) = self.flush() {
                log::error!("Failed to flush queue '{}' on drop: {err}", self.label);
            }
        }
    }
}

/// The command list and shader-visible heap of the active ring slot.
#[derive(Debug)]
pub struct SlotRecorder<'a> {
    /// The slot's command list, open for recording.
    pub list: &'a mut CommandList,
    /// The slot's shader-visible heap.
    pub heap: &'a mut DynamicGpuHeap,
}

impl SlotRecorder<'_> {
    /// Binds a technique and caches its root signature's tables in the heap.
    pub fn bind_technique(&mut self, techniques: &Techniques, id: TechniqueId) -> Result<(), RenderError> {
        let (technique, root_signature) = techniques.technique_with_root(id)?;
        self.list.set_technique(technique, root_signature);
        self.heap.cache_root_signature(root_signature)?;
        Ok(())
    }

    /// Stages a view in a table slot of the cached root signature.
    pub fn stage(&mut self, root_index: u32, offset: u32, view: &ResourceDescriptor) -> Result<(), HeapError> {
        self.heap.stage_view(root_index, offset, view)
    }

    /// Commits the staged tables on the bind point of the bound technique.
    pub fn commit(&mut self) -> u32 {
        let bind_point = self.list.bind_point();
        self.heap.commit_root_signature(self.list, bind_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCommand, MockDevice, MockShaderProvider};
    use crate::renderer::api::*;
    use crate::renderer::pipeline::{TechniqueCatalog, TechniqueDesc};
    use crate::renderer::traits::RenderDevice;
    use std::borrow::Cow;

    fn queue(device: &Arc<dyn RenderDevice>, ring_size: usize, policy: SlotReusePolicy) -> CommandQueue {
        CommandQueue::new(
            device,
            CommandQueueDesc {
                ring_size,
                slot_reuse: policy,
                ..CommandQueueDesc::new("test", QueueKind::Graphics)
            },
        )
        .expect("queue is created")
    }

    #[test]
    fn signal_returns_strictly_increasing_values() {
        let (_, device) = MockDevice::shared();
        let mut queue = queue(&device, 2, SlotReusePolicy::default());
        let values: Vec<u64> = (0..4).map(|_| queue.signal().expect("signal")).collect();
        assert_eq!(values, vec![1, 2, 3, 4]);
        assert_eq!(queue.flush().expect("flush"), 5);
        assert_eq!(queue.completed_value(), 5);
    }

    #[test]
    fn ring_starts_at_slot_zero_and_wraps() {
        let (_, device) = MockDevice::shared();
        let mut queue = queue(&device, 3, SlotReusePolicy::default());
        let mut visited = Vec::new();
        for _ in 0..4 {
            queue.reset_active_cl().expect("slot is free");
            visited.push(queue.active_index());
            queue.execute_active_cl().expect("list was recording");
            queue.signal().expect("signal");
        }
        assert_eq!(visited, vec![0, 1, 2, 0]);
    }

    #[test]
    fn reset_binds_the_slot_heap() {
        let (_, device) = MockDevice::shared();
        let mut queue = queue(&device, 2, SlotReusePolicy::default());
        let recorder = queue.reset_active_cl().expect("slot is free");
        let heap = recorder.heap.native_heap();
        assert_eq!(recorder.heap.cursor(), 0);
        assert!(MockCommand::recorded(recorder.list)
            .contains(&MockCommand::DescriptorHeaps(vec![heap])));
    }

    #[test]
    fn executing_twice_is_rejected() {
        let (_, device) = MockDevice::shared();
        let mut queue = queue(&device, 2, SlotReusePolicy::default());
        queue.reset_active_cl().expect("slot is free");
        queue.execute_active_cl().expect("list was recording");
        assert!(matches!(
            queue.execute_active_cl(),
            Err(CommandError::NotRecording { .. })
        ));
        assert!(queue.active_cl().is_err());
    }

    #[test]
    fn wrapping_onto_a_recording_slot_is_rejected() {
        let (_, device) = MockDevice::shared();
        let mut queue = queue(&device, 1, SlotReusePolicy::default());
        queue.reset_active_cl().expect("slot is free");
        assert!(matches!(
            queue.reset_active_cl(),
            Err(CommandError::SlotStillRecording { slot: 0, .. })
        ));
    }

    #[test]
    fn discarded_slot_is_reusable_without_submission() {
        let (_, device) = MockDevice::shared();
        let mut queue = queue(&device, 1, SlotReusePolicy::default());
        queue.reset_active_cl().expect("slot is free");
        queue.discard_active_cl().expect("list was recording");
        assert_eq!(queue.slot_state(0), Some(SlotState::Idle));
        assert!(queue.discard_active_cl().is_err());

        queue.reset_active_cl().expect("discarded slot is free again");
        assert_eq!(queue.last_signaled_value(), 0);
    }

    #[test]
    fn slot_fence_policy_covers_unsignaled_submissions() {
        let (_, device) = MockDevice::shared();
        let mut queue = queue(&device, 2, SlotReusePolicy::WaitForSlotFence);
        for _ in 0..2 {
            queue.reset_active_cl().expect("slot is free");
            queue.execute_active_cl().expect("list was recording");
        }
        assert_eq!(queue.last_signaled_value(), 0);

        queue.reset_active_cl().expect("slot 0 is reclaimed");
        assert_eq!(queue.last_signaled_value(), 1);
        assert_eq!(queue.slot_state(1), Some(SlotState::Signaled(1)));
    }

    #[test]
    fn external_policy_never_signals_on_its_own() {
        let (_, device) = MockDevice::shared();
        let mut queue = queue(&device, 2, SlotReusePolicy::External);
        for _ in 0..3 {
            queue.reset_active_cl().expect("caller paces the ring");
            queue.execute_active_cl().expect("list was recording");
        }
        assert_eq!(queue.last_signaled_value(), 0);
        assert_eq!(queue.slot_state(0), Some(SlotState::Submitted));
    }

    #[test]
    fn recorder_binds_technique_and_commits_its_tables() {
        let (mock, device) = MockDevice::shared();
        let mut catalog = TechniqueCatalog::new();
        let root = catalog.add_root_signature(RootSignatureDesc {
            label: Some(Cow::Borrowed("Compute")),
            parameters: vec![
                RootParameter::constants(0, 4),
                RootParameter::table([DescriptorRange::new(DescriptorRangeType::Uav, 2, 0)]),
            ],
            ..Default::default()
        });
        let cull = catalog.add_technique(TechniqueDesc {
            label: "Cull".to_string(),
            root_signature: root,
            pipeline: PipelineDesc::Compute(ComputePipelineDesc {
                shader: ShaderRef::new("cull", "CSMain"),
            }),
            writes_color: false,
        });
        let mut techniques = Techniques::new(device.clone(), Arc::new(MockShaderProvider::default()));
        techniques.on_init(&catalog).expect("catalog builds");

        let mut queue = queue(&device, 2, SlotReusePolicy::default());
        let mut recorder = queue.reset_active_cl().expect("slot is free");
        recorder.bind_technique(&techniques, cull).expect("technique exists");
        recorder
            .heap
            .stage_descriptor_in_table(1, 0, CpuDescriptorHandle(0x10))
            .expect("table is cached");
        recorder
            .heap
            .stage_descriptor_in_table(1, 1, CpuDescriptorHandle(0x20))
            .expect("table is cached");

        assert_eq!(recorder.commit(), 2);
        recorder.list.dispatch(8, 1, 1);
        assert_eq!(recorder.list.bind_point(), PipelineBindPoint::Compute);
        assert_eq!(recorder.list.bound_technique(), Some(cull));

        let stats = queue.execute_active_cl().expect("list was recording");
        assert_eq!(stats.descriptor_copies, 2);
        assert_eq!(stats.dispatches, 1);
        assert_eq!(mock.calls().descriptor_copies.len(), 2);
    }
}
