//! ChainService - owns the cursor chain on a tokio task
//!
//! Callers hold a [`ChainHandle`] and send requests over a channel; each
//! request carries a oneshot sender for its reply. Because only the service
//! task touches the chain, every buffer and cursor mutation happens in one
//! place and in the order requests arrive. Uploading a program to the device
//! runs on a separate worker task so it never stalls issuing, and every query
//! the service makes to the device is bounded by the configured timeout.

use crate::action::ActionKind;
use crate::chain::{CursorChain, Issued, Released, Stage};
use crate::compiler::{compiler_for, Compiler};
use crate::config::Config;
use crate::cursor::{CursorState, InitialState, RobotCursor};
use crate::device::DeviceLink;
use crate::error::CursorError;
use crate::streaming::{Streamed, Streamer};
use crate::{Result, RobokitError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const REQUEST_QUEUE: usize = 64;

pub type Reply<T> = oneshot::Sender<Result<T>>;

/// Point-in-time view of one stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageSnapshot {
    pub state: CursorState,
    pub initialized: bool,
    pub pending: usize,
    pub block: usize,
    pub released: usize,
}

/// Upload and streaming progress of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    pub uploading: bool,
    /// Streamed instructions not yet acknowledged by the device
    pub awaiting_ack: bool,
    pub streamed: usize,
}

pub enum Request {
    Initialize { state: InitialState, reply: Reply<()> },
    InitializeFromDevice { reply: Reply<InitialState> },
    Issue { kind: ActionKind, reply: Reply<Issued> },
    MarkBlock { reply: Reply<()> },
    Export { name: String, use_block: bool, reply: Reply<Vec<String>> },
    Execute { name: String, use_block: bool, reply: Reply<Option<Released>> },
    Tick { ready: bool, reply: Reply<Option<Streamed>> },
    Discard { reply: Reply<usize> },
    Snapshot { stage: Stage, reply: Reply<StageSnapshot> },
    Status { reply: Reply<ServiceStatus> },
    Shutdown { reply: oneshot::Sender<()> },
}

fn device_error(e: anyhow::Error) -> RobokitError {
    RobokitError::Device(e.to_string())
}

/// Await a device query for at most `limit`
async fn bounded<T>(limit: Duration, query: &str, call: impl Future<Output = anyhow::Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(device_error),
        Err(_) => {
            error!("Device {} query timed out after {:?}", query, limit);
            Err(RobokitError::Device(format!("{} query timed out after {:?}", query, limit)))
        }
    }
}

pub struct ChainService {
    chain: CursorChain,
    compiler: Box<dyn Compiler>,
    inline_targets: bool,
    device: Arc<dyn DeviceLink>,
    device_timeout: Duration,
    streamer: Streamer,
    worker: Option<JoinHandle<()>>,
    requests: mpsc::Receiver<Request>,
}

impl ChainService {
    /// Start the service with an uninitialized standard chain
    pub fn spawn(config: &Config, device: Arc<dyn DeviceLink>) -> ChainHandle {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
        let service = ChainService {
            chain: CursorChain::standard(&config.safety),
            compiler: compiler_for(config.compiler.platform),
            inline_targets: config.compiler.inline_targets,
            device: Arc::clone(&device),
            device_timeout: Duration::from_millis(config.execution.device_timeout_ms),
            streamer: Streamer::new(),
            worker: None,
            requests: rx,
        };
        tokio::spawn(service.run());
        info!("Chain service started for platform {}", config.compiler.platform);
        ChainHandle { tx, device }
    }

    async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            match request {
                Request::Initialize { state, reply } => {
                    let _ = reply.send(self.chain.initialize(state).map_err(Into::into));
                }
                Request::InitializeFromDevice { reply } => {
                    let _ = reply.send(self.initialize_from_device().await);
                }
                Request::Issue { kind, reply } => {
                    let _ = reply.send(self.chain.issue(kind).map_err(Into::into));
                }
                Request::MarkBlock { reply } => {
                    let _ = reply.send(self.chain.mark_block(Stage::Write).map_err(Into::into));
                }
                Request::Export { name, use_block, reply } => {
                    let _ = reply.send(self.export(&name, use_block));
                }
                Request::Execute { name, use_block, reply } => {
                    let _ = reply.send(self.execute(name, use_block).await);
                }
                Request::Tick { ready, reply } => {
                    let _ = reply.send(self.streamer.tick(ready, &mut self.chain, self.compiler.as_ref()));
                }
                Request::Discard { reply } => {
                    let _ = reply.send(self.chain.discard_pending(Stage::Write).map_err(Into::into));
                }
                Request::Snapshot { stage, reply } => {
                    let _ = reply.send(self.snapshot(stage));
                }
                Request::Status { reply } => {
                    let _ = reply.send(Ok(self.status()));
                }
                Request::Shutdown { reply } => {
                    if let Some(worker) = self.worker.take() {
                        if let Err(e) = worker.await {
                            error!("Upload worker ended abnormally: {}", e);
                        }
                    }
                    let _ = reply.send(());
                    break;
                }
            }
        }
        debug!("Chain service stopped");
    }

    async fn initialize_from_device(&mut self) -> Result<InitialState> {
        let pose = bounded(self.device_timeout, "pose", self.device.current_pose())
            .await?
            .ok_or_else(|| RobokitError::Device("device did not report a pose".to_string()))?;
        self.chain.initialize(pose)?;
        Ok(pose)
    }

    fn write_cursor(&self) -> Result<&RobotCursor> {
        self.chain
            .cursor(Stage::Write)
            .ok_or_else(|| CursorError::UnknownStage(Stage::Write.index()).into())
    }

    fn export(&self, name: &str, use_block: bool) -> Result<Vec<String>> {
        let program = self
            .compiler
            .generate_program(name, self.write_cursor()?, use_block, self.inline_targets)?;
        Ok(program)
    }

    fn worker_active(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.is_finished())
    }

    fn status(&self) -> ServiceStatus {
        ServiceStatus {
            uploading: self.worker_active(),
            awaiting_ack: self.streamer.is_awaiting(),
            streamed: self.streamer.sent(),
        }
    }

    /// Compile, commit to the motion stage and upload on a worker.
    /// Returns `None` without touching anything while a worker is alive
    /// or the device is still running a program.
    async fn execute(&mut self, name: String, use_block: bool) -> Result<Option<Released>> {
        if self.worker_active() {
            warn!("Execution of '{}' ignored, an upload is still in progress", name);
            return Ok(None);
        }
        if bounded(self.device_timeout, "running state", self.device.is_running()).await? {
            warn!("Execution of '{}' ignored, the device is running", name);
            return Ok(None);
        }

        let program = self.export(&name, use_block)?;
        let released = self.chain.release(Stage::Write, use_block)?;
        info!("Executing '{}' with {} actions", name, released.count);

        let device = Arc::clone(&self.device);
        self.worker = Some(tokio::spawn(async move {
            match device.run_program(&name, &program).await {
                Ok(()) => debug!("Uploaded '{}'", name),
                Err(e) => error!("Upload of '{}' failed: {}", name, e),
            }
        }));
        Ok(Some(released))
    }

    fn snapshot(&self, stage: Stage) -> Result<StageSnapshot> {
        let cursor = self
            .chain
            .cursor(stage)
            .ok_or(CursorError::UnknownStage(stage.index()))?;
        let buffer = cursor.buffer();
        Ok(StageSnapshot {
            state: cursor.state(),
            initialized: cursor.is_initialized(),
            pending: buffer.pending_len(),
            block: buffer.block_len(),
            released: buffer.released().len(),
        })
    }
}

/// Clonable front end to a running [`ChainService`]
#[derive(Clone)]
pub struct ChainHandle {
    tx: mpsc::Sender<Request>,
    device: Arc<dyn DeviceLink>,
}

impl ChainHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| RobokitError::ServiceClosed)?;
        response.await.map_err(|_| RobokitError::ServiceClosed)?
    }

    pub async fn initialize(&self, state: InitialState) -> Result<()> {
        self.request(|reply| Request::Initialize { state, reply }).await
    }

    /// Initialize every stage from the pose the device reports
    pub async fn initialize_from_device(&self) -> Result<InitialState> {
        self.request(|reply| Request::InitializeFromDevice { reply }).await
    }

    pub async fn issue(&self, kind: ActionKind) -> Result<Issued> {
        self.request(|reply| Request::Issue { kind, reply }).await
    }

    /// Flag everything currently pending on the write stage as the block
    pub async fn mark_block(&self) -> Result<()> {
        self.request(|reply| Request::MarkBlock { reply }).await
    }

    /// Compile the write stage without consuming it
    pub async fn export(&self, name: &str, use_block: bool) -> Result<Vec<String>> {
        let name = name.to_string();
        self.request(|reply| Request::Export { name, use_block, reply }).await
    }

    /// Commit and upload the write stage. `None` when the device or the
    /// upload worker is still busy.
    pub async fn execute(&self, name: &str, use_block: bool) -> Result<Option<Released>> {
        let name = name.to_string();
        self.request(|reply| Request::Execute { name, use_block, reply }).await
    }

    pub async fn tick(&self, ready: bool) -> Result<Option<Streamed>> {
        self.request(|reply| Request::Tick { ready, reply }).await
    }

    /// Drop everything pending on the write stage
    pub async fn discard_pending(&self) -> Result<usize> {
        self.request(|reply| Request::Discard { reply }).await
    }

    pub async fn snapshot(&self, stage: Stage) -> Result<StageSnapshot> {
        self.request(|reply| Request::Snapshot { stage, reply }).await
    }

    pub async fn status(&self) -> Result<ServiceStatus> {
        self.request(|reply| Request::Status { reply }).await
    }

    /// Wait for a running upload, then stop the service
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(Request::Shutdown { reply })
            .await
            .map_err(|_| RobokitError::ServiceClosed)?;
        done.await.map_err(|_| RobokitError::ServiceClosed)
    }

    /// Stream write-stage actions to the device, one per advance signal.
    ///
    /// The first action goes out immediately. Each signal acknowledges the
    /// last instructions sent and lets the next action through; settings-only
    /// actions are applied on the way without waiting. The task ends when the
    /// signal channel closes and returns the number of instruction batches sent.
    pub fn stream(&self, mut advance: mpsc::Receiver<()>) -> JoinHandle<Result<usize>> {
        let handle = self.clone();
        tokio::spawn(async move {
            let mut sent = handle.pump(false).await?;
            while advance.recv().await.is_some() {
                sent += handle.pump(true).await?;
            }
            debug!("Streaming finished after {} instructions", sent);
            Ok(sent)
        })
    }

    async fn pump(&self, mut ready: bool) -> Result<usize> {
        while let Some(streamed) = self.tick(ready).await? {
            ready = false;
            if streamed.lines.is_empty() {
                continue;
            }
            for line in &streamed.lines {
                self.device.send_instruction(line).await.map_err(device_error)?;
            }
            return Ok(1);
        }
        Ok(0)
    }
}
