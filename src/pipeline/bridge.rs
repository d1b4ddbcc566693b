//! Thread boundary between callers and a background pipeline worker.
//!
//! `PipelineBridge` owns a worker thread that executes submitted pipelines
//! one at a time. Commands go in over a bounded channel, run results come
//! back over another. Each submission gets a [`RunHandle`] whose cancel
//! token is checked by the executor between nodes.
//!
//! Sends never block: a full command queue rejects the submission. Dropping
//! the bridge disconnects the worker, skips runs still queued and waits only
//! for the run in progress.

use crate::pipeline::error::PipelineError;
use crate::pipeline::executor::{CancelToken, Pipeline, RunOutput};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Commands sent to the pipeline worker.
#[derive(Debug)]
pub enum PipelineCommand {
    /// Execute a pipeline snapshot.
    Execute {
        run_id: u64,
        pipeline: Box<Pipeline>,
        cancel: CancelToken,
    },
    /// Shut down the worker thread.
    Shutdown,
}

/// Messages sent from the worker back to the caller.
#[derive(Debug)]
pub enum PipelineMessage {
    /// A run finished; outputs are keyed by node id in execution order.
    RunCompleted {
        run_id: u64,
        outputs: RunOutput,
        elapsed: Duration,
    },

    /// A run stopped on a structural or operator error.
    RunFailed { run_id: u64, error: PipelineError },

    /// A run observed its cancel token and discarded its results.
    RunCancelled { run_id: u64 },

    /// Worker is shutting down.
    Shutdown,
}

impl PipelineMessage {
    pub fn run_id(&self) -> Option<u64> {
        match self {
            PipelineMessage::RunCompleted { run_id, .. }
            | PipelineMessage::RunFailed { run_id, .. }
            | PipelineMessage::RunCancelled { run_id } => Some(*run_id),
            PipelineMessage::Shutdown => None,
        }
    }
}

/// Channel capacity for commands (caller → worker).
const CMD_CHANNEL_CAPACITY: usize = 64;
/// Channel capacity for messages (worker → caller).
const MSG_CHANNEL_CAPACITY: usize = 256;

/// Handle to one submitted run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub run_id: u64,
    cancel: CancelToken,
}

impl RunHandle {
    /// Request cancellation; takes effect before the next node starts.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Caller-side handle for the pipeline worker thread.
pub struct PipelineBridge {
    cmd_tx: Option<Sender<PipelineCommand>>,
    msg_rx: Receiver<PipelineMessage>,
    closing: CancelToken,
    worker: Option<JoinHandle<()>>,
    next_run_id: u64,
}

impl PipelineBridge {
    /// Start the worker thread.
    pub fn spawn() -> std::io::Result<Self> {
        let (cmd_tx, cmd_rx) = bounded(CMD_CHANNEL_CAPACITY);
        let (msg_tx, msg_rx) = bounded(MSG_CHANNEL_CAPACITY);
        let closing = CancelToken::new();
        let worker_closing = closing.clone();
        let worker = std::thread::Builder::new()
            .name("dataforge-pipeline".to_string())
            .spawn(move || run_worker(cmd_rx, msg_tx, worker_closing))?;
        Ok(Self {
            cmd_tx: Some(cmd_tx),
            msg_rx,
            closing,
            worker: Some(worker),
            next_run_id: 0,
        })
    }

    /// Queue a pipeline for execution.
    ///
    /// Returns `None` if the worker is gone or the command queue is full.
    pub fn submit(&mut self, pipeline: Pipeline) -> Option<RunHandle> {
        self.submit_with_cancel(pipeline, CancelToken::new())
    }

    /// Queue a pipeline with a caller-provided cancel token.
    pub fn submit_with_cancel(
        &mut self,
        pipeline: Pipeline,
        cancel: CancelToken,
    ) -> Option<RunHandle> {
        let run_id = self.next_run_id;
        let cmd = PipelineCommand::Execute {
            run_id,
            pipeline: Box::new(pipeline),
            cancel: cancel.clone(),
        };
        if !self.send_command(cmd) {
            tracing::warn!("Run {} not queued", run_id);
            return None;
        }
        self.next_run_id += 1;
        Some(RunHandle { run_id, cancel })
    }

    /// Send a command without blocking. Returns `false` if the queue is full
    /// or the worker is gone.
    pub fn send_command(&self, cmd: PipelineCommand) -> bool {
        let Some(cmd_tx) = &self.cmd_tx else {
            return false;
        };
        match cmd_tx.try_send(cmd) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    "Pipeline command queue full ({} pending)",
                    CMD_CHANNEL_CAPACITY
                );
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("Pipeline worker is gone");
                false
            }
        }
    }

    /// Block until the next message arrives.
    pub fn recv(&self) -> Option<PipelineMessage> {
        self.msg_rx.recv().ok()
    }

    /// Block for at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PipelineMessage> {
        match self.msg_rx.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Try to receive a single message without blocking.
    pub fn try_recv(&self) -> Option<PipelineMessage> {
        self.msg_rx.try_recv().ok()
    }

    /// Drain all pending messages.
    pub fn drain(&self) -> Vec<PipelineMessage> {
        self.msg_rx.try_iter().collect()
    }

    /// Ask the worker to stop once it reaches this command.
    pub fn shutdown(&self) -> bool {
        self.send_command(PipelineCommand::Shutdown)
    }
}

impl Drop for PipelineBridge {
    fn drop(&mut self) {
        self.closing.cancel();
        self.cmd_tx.take();
        // Keep the worker from blocking on a full message channel.
        for _ in self.msg_rx.iter() {}
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Pipeline worker panicked");
            }
        }
    }
}

fn run_worker(
    cmd_rx: Receiver<PipelineCommand>,
    msg_tx: Sender<PipelineMessage>,
    closing: CancelToken,
) {
    tracing::info!("Pipeline worker started");

    while let Ok(cmd) = cmd_rx.recv() {
        if closing.is_cancelled() {
            tracing::debug!("Bridge dropped, skipping {} queued commands", cmd_rx.len() + 1);
            break;
        }
        match cmd {
            PipelineCommand::Execute {
                run_id,
                mut pipeline,
                cancel,
            } => {
                let started = Instant::now();
                let msg = match pipeline.execute_with_cancel(&cancel) {
                    Ok(outputs) => PipelineMessage::RunCompleted {
                        run_id,
                        outputs,
                        elapsed: started.elapsed(),
                    },
                    Err(PipelineError::Cancelled) => PipelineMessage::RunCancelled { run_id },
                    Err(error) => PipelineMessage::RunFailed { run_id, error },
                };
                if msg_tx.send(msg).is_err() {
                    break;
                }
            }
            PipelineCommand::Shutdown => break,
        }
    }

    let _ = msg_tx.send(PipelineMessage::Shutdown);
    tracing::info!("Pipeline worker stopped");
}
