use std::net::SocketAddr;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use super::controller::WatchController;
use super::protocol::{ControlError, ControlResponse};

/// Accept control connections until `shutdown` fires. Each connection runs
/// on its own task; a failing connection never takes the listener down.
pub async fn serve(
    listener: TcpListener,
    controller: WatchController,
    shutdown: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        controller.clone(),
                        shutdown.clone(),
                    ));
                }
                Err(err) => error!("Failed to accept control connection: {err}"),
            },
        }
    }

    info!("Control channel closed");
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    controller: WatchController,
    shutdown: CancellationToken,
) {
    if let Err(err) = serve_connection(stream, peer, &controller, &shutdown).await {
        error!("Client connection error ({peer}): {err:?}");
    }
    info!("Client disconnected ({peer})");
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    controller: &WatchController,
    shutdown: &CancellationToken,
) -> Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .context("websocket handshake failed")?;
    let (mut write, mut read) = ws_stream.split();

    info!("Client connected ({peer})");

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = read.next() => next,
        };
        let Some(message) = next else {
            break;
        };

        let response = match message.context("failed to read client message")? {
            Message::Text(text) => {
                debug!("Message received from {peer}: {text}");
                controller.handle_message(&text).await
            }
            Message::Binary(_) => ControlResponse::error(&ControlError::InvalidFormat),
            Message::Close(_) => break,
            // Pings are answered by tungstenite itself.
            _ => continue,
        };

        write
            .send(Message::Text(response.to_json()))
            .await
            .context("failed to send response")?;
    }

    Ok(())
}
