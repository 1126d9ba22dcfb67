//! Change-detection broadcast loop.
//!
//! A fixed 50 ms tick: build a snapshot through the engine, serialize it to
//! the canonical JSON form, and push it to the client fan-out channel only
//! when it differs from the last payload that reached a client. The loop is
//! the sole owner of that "last sent" value, so no locking is involved. A
//! slow platform read simply delays the tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast::Sender, oneshot};
use tracing::{debug, warn};

use crate::engine::EngineHandle;
use crate::snapshot;

/// Tick cadence. Fixed, not adaptive.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Run until `shutdown` fires. `updates` fans payloads out to every
/// connected client task.
pub async fn run(engine: EngineHandle, updates: Sender<Arc<String>>, mut shutdown: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    // Starts empty so the first tick always differs and broadcasts the
    // initial state.
    let mut last_sent = String::new();

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let entries = match engine.snapshot().await {
                    Ok(entries) => entries,
                    Err(err) => {
                        warn!("skipping tick, snapshot failed: {err}");
                        continue;
                    }
                };
                let payload = match snapshot::serialize(&entries) {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!("skipping tick, serialization failed: {err}");
                        continue;
                    }
                };
                if payload != last_sent {
                    // Only a send that reached at least one client commits the
                    // payload; otherwise it is offered again next tick, which
                    // is how a client connecting between changes catches up.
                    if updates.send(Arc::new(payload.clone())).is_ok() {
                        last_sent = payload;
                    }
                }
            }
        }
    }
    debug!("broadcast loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fake::FakeAudioSystem;
    use crate::directory::{FixedNames, SessionDirectory};
    use crate::engine;
    use std::collections::HashMap;
    use tokio::sync::broadcast;
    use tokio::time::timeout;

    const RECV_DEADLINE: Duration = Duration::from_secs(2);
    /// Long enough for several ticks to pass.
    const QUIET_WINDOW: Duration = Duration::from_millis(300);

    async fn start_loop(
        fake: &FakeAudioSystem,
    ) -> (
        broadcast::Receiver<Arc<String>>,
        oneshot::Sender<()>,
        tokio::task::JoinHandle<()>,
    ) {
        let system = fake.clone();
        let directory = SessionDirectory::with_names(Box::new(FixedNames(HashMap::new())));
        let engine = engine::spawn(move || Ok(system.boxed()), directory)
            .await
            .expect("spawn engine");

        let (updates, receiver) = broadcast::channel(16);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(engine, updates, shutdown_rx));
        (receiver, shutdown, task)
    }

    #[tokio::test]
    async fn first_tick_broadcasts_then_quiesces_until_change() {
        let fake = FakeAudioSystem::new();
        let (mut receiver, shutdown, task) = start_loop(&fake).await;

        // Initial state goes out even though nothing changed yet.
        let initial = timeout(RECV_DEADLINE, receiver.recv())
            .await
            .expect("initial broadcast")
            .expect("channel open");
        assert!(initial.contains(r#""Pid":-1"#));
        assert!(initial.contains(r#""Volume":50.0"#));

        // Identical snapshots produce no further traffic.
        let quiet = timeout(QUIET_WINDOW, receiver.recv()).await;
        assert!(quiet.is_err(), "unchanged state must not rebroadcast");

        // A mutation shows up as exactly one new payload.
        fake.set_endpoint(0.25, false);
        let changed = timeout(RECV_DEADLINE, receiver.recv())
            .await
            .expect("change broadcast")
            .expect("channel open");
        assert!(changed.contains(r#""Volume":25.0"#));

        shutdown.send(()).expect("signal shutdown");
        timeout(RECV_DEADLINE, task).await.expect("loop exits").expect("join");
    }

    #[tokio::test]
    async fn uncommitted_payloads_reach_a_late_subscriber() {
        let fake = FakeAudioSystem::new();
        let system = fake.clone();
        let directory = SessionDirectory::with_names(Box::new(FixedNames(HashMap::new())));
        let engine = engine::spawn(move || Ok(system.boxed()), directory)
            .await
            .expect("spawn engine");

        let (updates, _) = broadcast::channel(16);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(engine, updates.clone(), shutdown_rx));

        // Let the loop tick with nobody listening, then subscribe. The
        // payload was never committed, so it is offered again.
        tokio::time::sleep(QUIET_WINDOW).await;
        let mut receiver = updates.subscribe();
        let payload = timeout(RECV_DEADLINE, receiver.recv())
            .await
            .expect("catch-up broadcast")
            .expect("channel open");
        assert!(payload.contains(r#""Pid":-1"#));

        shutdown.send(()).expect("signal shutdown");
        timeout(RECV_DEADLINE, task).await.expect("loop exits").expect("join");
    }
}
