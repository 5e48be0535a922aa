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

//! The simulated hardware queue.
//!
//! Every queue owns a worker thread fed through a channel. The worker is the
//! queue's GPU timeline: it runs submissions, signals and waits strictly in
//! submission order, and replays each command list against the device's actual
//! resource states.

use super::command::{Command, HeadlessCommandList};
use super::fence::HeadlessFence;
use super::state::{DeviceState, ExecutionEvent, PipelineEntry, ResourceData, ValidationError};
use crossbeam_channel::{Receiver, Sender};
use ferrite_core::renderer::api::*;
use ferrite_core::renderer::error::{DeviceError, NativeObject, STATUS_INVALID_ARG};
use ferrite_core::renderer::traits::{NativeCommandList, NativeFence, NativeQueue};
use ferrite_core::utils::lock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub(crate) enum QueueOp {
    Execute {
        list: String,
        commands: Arc<[Command]>,
        done: Arc<AtomicBool>,
    },
    Signal {
        fence: Arc<dyn NativeFence>,
        value: u64,
    },
    Wait {
        fence: Arc<dyn NativeFence>,
        value: u64,
    },
    Present {
        resource: NativeResourceId,
    },
    Shutdown,
}

/// A hardware queue of the headless backend.
pub struct HeadlessQueue {
    kind: QueueKind,
    label: String,
    sender: Sender<QueueOp>,
    worker: Option<JoinHandle<()>>,
}

impl HeadlessQueue {
    pub(crate) fn spawn(kind: QueueKind, label: &str, state: Arc<DeviceState>) -> Result<Self, DeviceError> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let worker_state = state.clone();
        let worker_label = label.to_string();
        let worker = std::thread::Builder::new()
            .name(format!("ferrite-{}-queue", kind.as_str()))
            .spawn(move || run_worker(worker_label, worker_state, receiver))
            .map_err(|err| {
                DeviceError::failed(
                    NativeObject::CommandQueue,
                    format!("failed to start the timeline of queue '{label}': {err}"),
                )
            })?;

        if kind == QueueKind::Graphics {
            *lock(&state.present_queue) = Some((label.to_string(), sender.clone()));
        }
        Ok(Self {
            kind,
            label: label.to_string(),
            sender,
            worker: Some(worker),
        })
    }

    fn send(&self, op: QueueOp) -> Result<(), DeviceError> {
        self.sender.send(op).map_err(|_| {
            DeviceError::failed(
                NativeObject::Submission,
                format!("the timeline of queue '{}' has stopped", self.label),
            )
        })
    }

    fn check_fence(fence: &Arc<dyn NativeFence>) -> Result<(), DeviceError> {
        if fence.as_any().is::<HeadlessFence>() {
            Ok(())
        } else {
            Err(DeviceError::new(
                NativeObject::Fence,
                STATUS_INVALID_ARG,
                "fence belongs to another backend",
            ))
        }
    }
}

impl fmt::Debug for HeadlessQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessQueue")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .finish()
    }
}

impl NativeQueue for HeadlessQueue {
    fn kind(&self) -> QueueKind {
        self.kind
    }

    fn execute_command_lists(&self, lists: &mut [&mut dyn NativeCommandList]) -> Result<(), DeviceError> {
        for list in lists.iter_mut() {
            let list = list
                .as_any_mut()
                .downcast_mut::<HeadlessCommandList>()
                .ok_or_else(|| {
                    DeviceError::new(
                        NativeObject::Submission,
                        STATUS_INVALID_ARG,
                        "command list belongs to another backend",
                    )
                })?;
            if list.kind() != self.kind {
                return Err(DeviceError::new(
                    NativeObject::Submission,
                    STATUS_INVALID_ARG,
                    format!(
                        "{} list '{}' submitted to {} queue '{}'",
                        list.kind().as_str(),
                        list.label(),
                        self.kind.as_str(),
                        self.label
                    ),
                ));
            }
            let (commands, done) = list.submit()?;
            self.send(QueueOp::Execute {
                list: list.label().to_string(),
                commands,
                done,
            })?;
        }
        Ok(())
    }

    fn signal(&self, fence: &Arc<dyn NativeFence>, value: u64) -> Result<(), DeviceError> {
        Self::check_fence(fence)?;
        self.send(QueueOp::Signal {
            fence: fence.clone(),
            value,
        })
    }

    fn wait(&self, fence: &Arc<dyn NativeFence>, value: u64) -> Result<(), DeviceError> {
        Self::check_fence(fence)?;
        self.send(QueueOp::Wait {
            fence: fence.clone(),
            value,
        })
    }
}

impl Drop for HeadlessQueue {
    fn drop(&mut self) {
        // A failed send means the worker is already gone.
        let _ = self.sender.send(QueueOp::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("The timeline of queue '{}' panicked", self.label);
            }
        }
    }
}

fn run_worker(queue: String, state: Arc<DeviceState>, receiver: Receiver<QueueOp>) {
    log::debug!("GPU timeline of queue '{queue}' started");
    for op in receiver.iter() {
        match op {
            QueueOp::Execute {
                list,
                commands,
                done,
            } => {
                Replay::new(&state, &list).run(&commands);
                done.store(true, Ordering::Release);
                state.record(ExecutionEvent::Executed {
                    queue: queue.clone(),
                    list,
                    commands: commands.len(),
                });
            }
            QueueOp::Signal { fence, value } => {
                state.record(ExecutionEvent::Signaled {
                    queue: queue.clone(),
                    value,
                });
                if let Err(err) = fence.signal(value) {
                    log::error!("Queue '{queue}' failed to signal {value}: {err}");
                }
            }
            QueueOp::Wait { fence, value } => match fence.wait_for_value(value) {
                Ok(()) => state.record(ExecutionEvent::Waited {
                    queue: queue.clone(),
                    value,
                }),
                Err(_) => state.report(ValidationError::WaitTimedOut {
                    queue: queue.clone(),
                    value,
                }),
            },
            QueueOp::Present { resource } => {
                let actual = lock(&state.resources).get(&resource).map(|entry| entry.state);
                match actual {
                    Some(actual) if actual != ResourceState::PRESENT => {
                        state.report(ValidationError::PresentState { resource, actual })
                    }
                    Some(_) => state.record(ExecutionEvent::Presented {
                        queue: queue.clone(),
                        resource,
                    }),
                    None => state.report(ValidationError::UnknownResource {
                        list: queue.clone(),
                        resource,
                    }),
                }
            }
            QueueOp::Shutdown => break,
        }
    }
    log::debug!("GPU timeline of queue '{queue}' stopped");
}

/// Replays one command list against the device's actual resource states.
struct Replay<'a> {
    state: &'a DeviceState,
    list: &'a str,
    pipeline: Option<PipelineEntry>,
    graphics_root: Option<NativeRootSignatureId>,
    compute_root: Option<NativeRootSignatureId>,
}

impl<'a> Replay<'a> {
    fn new(state: &'a DeviceState, list: &'a str) -> Self {
        Self {
            state,
            list,
            pipeline: None,
            graphics_root: None,
            compute_root: None,
        }
    }

    fn run(&mut self, commands: &[Command]) {
        for command in commands {
            match command {
                Command::Barrier(barriers) => self.barriers(barriers),
                Command::Pipeline(pipeline) => {
                    self.pipeline = lock(&self.state.pipelines).get(pipeline).copied();
                    if self.pipeline.is_none() {
                        log::warn!("[{}] pipeline {pipeline:?} does not exist", self.list);
                    }
                }
                Command::RootSignature(bind_point, root_signature) => match bind_point {
                    PipelineBindPoint::Graphics => self.graphics_root = Some(*root_signature),
                    PipelineBindPoint::Compute => self.compute_root = Some(*root_signature),
                },
                Command::DescriptorTable {
                    bind_point,
                    root_index,
                    ..
                }
                | Command::RootConstants {
                    bind_point,
                    root_index,
                    ..
                }
                | Command::RootConstantBuffer(bind_point, root_index, _)
                | Command::RootShaderResource(bind_point, root_index, _) => {
                    self.check_root_index(*bind_point, *root_index)
                }
                Command::Draw { .. } | Command::DrawIndexed { .. } => {
                    self.require_pipeline("draw", false)
                }
                Command::Dispatch(..) => self.require_pipeline("dispatch", true),
                Command::RenderTargets(render_targets, depth_stencil) => {
                    for handle in render_targets {
                        self.check_view_state(
                            "render target binding",
                            handle.0,
                            &[ResourceState::RenderTarget],
                        );
                    }
                    if let Some(handle) = depth_stencil {
                        self.check_view_state(
                            "depth target binding",
                            handle.0,
                            &[ResourceState::DepthWrite, ResourceState::DepthRead],
                        );
                    }
                }
                Command::ClearRenderTarget(handle, _) => {
                    self.check_view_state("clear", handle.0, &[ResourceState::RenderTarget])
                }
                Command::ClearDepthStencil(handle, ..) => {
                    self.check_view_state("clear", handle.0, &[ResourceState::DepthWrite])
                }
                Command::CopyBuffer {
                    destination,
                    destination_offset,
                    source,
                    source_offset,
                    size,
                } => self.copy(*destination, *destination_offset, *source, *source_offset, *size),
                _ => {}
            }
        }
    }

    fn barriers(&self, barriers: &[TransitionBarrier]) {
        let mut resources = lock(&self.state.resources);
        for barrier in barriers {
            let Some(entry) = resources.get_mut(&barrier.resource) else {
                self.state.report(ValidationError::UnknownResource {
                    list: self.list.to_string(),
                    resource: barrier.resource,
                });
                continue;
            };
            if entry.state != barrier.before {
                self.state.report(ValidationError::StateMismatch {
                    list: self.list.to_string(),
                    resource: barrier.resource,
                    declared: barrier.before,
                    actual: entry.state,
                });
            }
            entry.state = barrier.after;
        }
    }

    fn bound_root(&self, bind_point: PipelineBindPoint) -> Option<NativeRootSignatureId> {
        match bind_point {
            PipelineBindPoint::Graphics => self.graphics_root,
            PipelineBindPoint::Compute => self.compute_root,
        }
    }

    fn check_root_index(&self, bind_point: PipelineBindPoint, root_index: u32) {
        let parameters = self
            .bound_root(bind_point)
            .and_then(|root| lock(&self.state.root_signatures).get(&root).copied());
        if parameters.is_none_or(|count| root_index as usize >= count) {
            self.state.report(ValidationError::RootIndexOutOfRange {
                list: self.list.to_string(),
                root_index,
            });
        }
    }

    fn require_pipeline(&self, operation: &'static str, compute: bool) {
        let Some(pipeline) = self.pipeline.filter(|pipeline| pipeline.compute == compute) else {
            self.state.report(ValidationError::MissingPipeline {
                list: self.list.to_string(),
                operation,
                expected: if compute { "compute" } else { "graphics" },
            });
            return;
        };
        let bind_point = if compute {
            PipelineBindPoint::Compute
        } else {
            PipelineBindPoint::Graphics
        };
        let bound = self.bound_root(bind_point);
        if bound != Some(pipeline.root_signature) {
            self.state.report(ValidationError::RootSignatureMismatch {
                list: self.list.to_string(),
                operation,
                expected: pipeline.root_signature,
                bound,
            });
        }
    }

    fn check_view_state(&self, operation: &'static str, handle: u64, allowed: &[ResourceState]) {
        let Some(content) = self.state.descriptor(handle) else {
            self.state.report(ValidationError::UnknownDescriptor { handle });
            return;
        };
        self.check_state(operation, content.resource, allowed);
    }

    fn check_state(&self, operation: &'static str, resource: NativeResourceId, allowed: &[ResourceState]) {
        let actual = lock(&self.state.resources).get(&resource).map(|entry| entry.state);
        match actual {
            Some(actual) if !allowed.contains(&actual) => {
                self.state.report(ValidationError::WrongState {
                    list: self.list.to_string(),
                    operation,
                    resource,
                    actual,
                })
            }
            Some(_) => {}
            None => self.state.report(ValidationError::UnknownResource {
                list: self.list.to_string(),
                resource,
            }),
        }
    }

    fn copy(&self, destination: NativeResourceId, destination_offset: u64, source: NativeResourceId, source_offset: u64, size: u64) {
        self.check_state("copy", destination, &[ResourceState::CopyDest]);
        self.check_state(
            "copy",
            source,
            &[ResourceState::CopySource, ResourceState::GenericRead],
        );

        let mut resources = lock(&self.state.resources);
        let bytes = match resources.get(&source).map(|entry| &entry.data) {
            Some(ResourceData::Buffer { bytes, size: total, .. }) if range_fits(source_offset, size, *total) => {
                let mut chunk = vec![0u8; size as usize];
                let start = source_offset as usize;
                let available = bytes.len().saturating_sub(start).min(chunk.len());
                if available > 0 {
                    chunk[..available].copy_from_slice(&bytes[start..start + available]);
                }
                chunk
            }
            _ => {
                log::warn!("[{}] copy reads outside of {source:?}", self.list);
                return;
            }
        };
        match resources.get_mut(&destination).map(|entry| &mut entry.data) {
            Some(ResourceData::Buffer { bytes: target, size: total, .. })
                if range_fits(destination_offset, size, *total) =>
            {
                let end = (destination_offset + size) as usize;
                if target.len() < end {
                    target.resize(end, 0);
                }
                target[destination_offset as usize..end].copy_from_slice(&bytes);
            }
            _ => log::warn!("[{}] copy writes outside of {destination:?}", self.list),
        }
    }
}

fn range_fits(offset: u64, size: u64, total: u64) -> bool {
    offset.checked_add(size).is_some_and(|end| end <= total)
}
