//! TCP front door.
//!
//! One task per client. Server→client traffic is the snapshot JSON, one
//! array per line, pushed whenever the broadcast loop detects a change.
//! Client→server traffic is one `action*pid*value` command per line; a line
//! that does not parse is dropped silently. A client that falls behind the
//! fan-out channel skips the missed payloads and picks up from the next one.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::command;
use crate::engine::EngineHandle;

/// Accept clients forever.
pub async fn serve(
    listener: TcpListener,
    engine: EngineHandle,
    updates: Sender<Arc<String>>,
) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        info!("client connected: {peer}");
        let engine = engine.clone();
        let receiver = updates.subscribe();
        tokio::spawn(async move {
            handle_client(stream, engine, receiver).await;
            info!("client disconnected: {peer}");
        });
    }
}

async fn handle_client(stream: TcpStream, engine: EngineHandle, mut updates: Receiver<Arc<String>>) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Ok(payload) => {
                        if writer.write_all(payload.as_bytes()).await.is_err()
                            || writer.write_all(b"\n").await.is_err()
                        {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("slow client skipped {skipped} updates");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => match command::parse(&line) {
                        Ok(parsed) => engine.apply(parsed).await,
                        // Unparsable messages are dropped with no reply.
                        Err(err) => debug!("{err}"),
                    },
                    Ok(None) | Err(_) => break,
                }
            }
        }
    }
}
