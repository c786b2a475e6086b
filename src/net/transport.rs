//! Controller transport over TCP
//!
//! Every connection exchanges length-prefixed JSON frames. Envelopes are
//! decoded on the connection task; only well-formed, known commands reach
//! the command queue, and the reply is written once the loop applied them.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::game::command_queue::CommandSender;
use crate::net::framing::{read_message, write_json, FramingError};
use crate::net::protocol::{Envelope, Response};

/// TCP listener accepting controller connections
pub struct ControllerServer {
    listener: TcpListener,
    commands: CommandSender,
}

impl ControllerServer {
    pub async fn bind(addr: SocketAddr, commands: CommandSender) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, commands })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the listener fails
    pub async fn run(self) -> anyhow::Result<()> {
        info!("Controller endpoint listening on {}", self.listener.local_addr()?);

        loop {
            let (stream, peer) = self.listener.accept().await?;
            let commands = self.commands.clone();

            tokio::spawn(async move {
                debug!("Controller connected from {}", peer);
                match handle_connection(stream, commands).await {
                    Ok(()) | Err(FramingError::ConnectionClosed) => {
                        debug!("Controller {} disconnected", peer);
                    }
                    Err(e) => warn!("Controller {} connection error: {}", peer, e),
                }
            });
        }
    }
}

/// Serve one controller until it disconnects
pub async fn handle_connection<S>(mut stream: S, commands: CommandSender) -> Result<(), FramingError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let payload = read_message(&mut stream).await?;
        let response = handle_request(&payload, &commands).await;
        write_json(&mut stream, &response).await?;
    }
}

/// Decode one request, run it through the queue and build the reply
pub async fn handle_request(payload: &[u8], commands: &CommandSender) -> Response {
    let command = match Envelope::from_slice(payload).and_then(Envelope::into_command) {
        Ok(command) => command,
        Err(e) => {
            warn!("Rejected controller request: {}", e);
            return Response::from(&e);
        }
    };

    match commands.execute(command).await {
        Ok(Ok(output)) => Response::from(output),
        Ok(Err(e)) => Response::from(&e),
        Err(e) => {
            warn!("Command not executed: {}", e);
            Response::from(&e)
        }
    }
}
