//! The audio engine: one thread that owns every platform call.
//!
//! Platform audio objects are thread-affine and not safe for concurrent use,
//! so all access (snapshot builds from the broadcast loop, mutations from
//! client commands) is serialized through a single dedicated worker thread
//! reading one request queue. The worker owns the boxed [`AudioSystem`] and
//! the [`SessionDirectory`]; nothing else ever touches them.

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::audio::{AudioError, AudioSystem, DeviceInfo};
use crate::command::{self, Command};
use crate::directory::SessionDirectory;
use crate::snapshot::{self, AudioInfo};

enum Request {
    Snapshot(oneshot::Sender<Vec<AudioInfo>>),
    Devices(oneshot::Sender<Result<Vec<DeviceInfo>, AudioError>>),
    Apply(Command),
}

/// Cloneable handle to the engine thread. All methods enqueue a request; the
/// worker answers in queue order.
#[derive(Clone)]
pub struct EngineHandle {
    requests: mpsc::Sender<Request>,
}

impl EngineHandle {
    /// Build a snapshot of the current mixer state.
    pub async fn snapshot(&self) -> anyhow::Result<Vec<AudioInfo>> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Snapshot(reply))
            .await
            .map_err(|_| anyhow!("audio engine stopped"))?;
        response.await.map_err(|_| anyhow!("audio engine stopped"))
    }

    /// List audio endpoint devices with their decoded properties.
    pub async fn devices(&self) -> anyhow::Result<Vec<DeviceInfo>> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Devices(reply))
            .await
            .map_err(|_| anyhow!("audio engine stopped"))?;
        Ok(response.await.map_err(|_| anyhow!("audio engine stopped"))??)
    }

    /// Apply a client command. Fire-and-forget: failures are the worker's to
    /// log and discard, nothing is reported back to the sender.
    pub async fn apply(&self, command: Command) {
        let _ = self.requests.send(Request::Apply(command)).await;
    }
}

/// Start the engine thread. The factory runs ON the worker thread, so the
/// platform adapter (and its COM state) is created where it will live.
/// Returns once the platform collaborator initialized; that is the one
/// failure fatal to the whole server.
pub async fn spawn<F>(factory: F, directory: SessionDirectory) -> anyhow::Result<EngineHandle>
where
    F: FnOnce() -> anyhow::Result<Box<dyn AudioSystem>> + Send + 'static,
{
    let (requests, receiver) = mpsc::channel(64);
    let (ready, initialized) = oneshot::channel();

    std::thread::Builder::new()
        .name("audio-engine".into())
        .spawn(move || worker(factory, directory, receiver, ready))?;

    initialized
        .await
        .map_err(|_| anyhow!("audio engine thread died during startup"))??;
    Ok(EngineHandle { requests })
}

fn worker<F>(
    factory: F,
    mut directory: SessionDirectory,
    mut receiver: mpsc::Receiver<Request>,
    ready: oneshot::Sender<anyhow::Result<()>>,
) where
    F: FnOnce() -> anyhow::Result<Box<dyn AudioSystem>>,
{
    let mut system = match factory() {
        Ok(system) => {
            let _ = ready.send(Ok(()));
            system
        }
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    while let Some(request) = receiver.blocking_recv() {
        match request {
            Request::Snapshot(reply) => {
                let _ = reply.send(snapshot::build(system.as_mut(), &mut directory));
            }
            Request::Devices(reply) => {
                let _ = reply.send(system.devices());
            }
            Request::Apply(request) => {
                if let Err(err) = command::apply(system.as_mut(), request) {
                    debug!(?request, "command dropped: {err}");
                }
            }
        }
    }
    debug!("audio engine stopping, request queue closed");
}
