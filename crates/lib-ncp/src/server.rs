use std::path::PathBuf;

use thiserror::Error;
use tokio::net::UnixDatagram;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::engine::{Action, Engine};
use crate::imp::ImpDriver;
use crate::types::Frame;

/// Largest host-IMP message the daemon accepts, in bytes.
const IMP_BUFFER: usize = 1024;
/// Largest application request frame.
const APP_BUFFER: usize = 1024;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Bind error on {path}: {source}. Is $NCP set to the path of a domain socket? If so, remove the stale file before retrying")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Removes the application socket path when the server stops.
struct SocketGuard(PathBuf);

impl Drop for SocketGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// Single-task reactor over the IMP driver and the application socket.
///
/// Every ready input is handed to the [`Engine`] and runs to completion;
/// the traffic it generated is flushed before the next input is read.
pub struct Server<D> {
    driver: D,
    path: PathBuf,
    engine: Engine,
}

impl<D: ImpDriver> Server<D> {
    pub fn new(driver: D, path: impl Into<PathBuf>) -> Self {
        Self {
            driver,
            path: path.into(),
            engine: Engine::new(),
        }
    }

    pub async fn run(&mut self) -> Result<(), ServerError> {
        let socket = UnixDatagram::bind(&self.path).map_err(|source| ServerError::Bind {
            path: self.path.clone(),
            source,
        })?;
        let _guard = SocketGuard(self.path.clone());
        info!(path = %self.path.display(), "listening for applications");

        self.driver.host_ready(true).await?;
        self.engine.imp_ready(true);

        // Prime the link the way the reference peer expects: three NOPs
        // roughly a second apart.
        for n in 0..3 {
            let nop = Frame::nop();
            self.driver.send(nop.bytes(), nop.words()).await?;
            if n < 2 {
                sleep(Duration::from_secs(1)).await;
            }
        }

        let mut imp_buf = [0u8; IMP_BUFFER];
        let mut app_buf = [0u8; APP_BUFFER];
        let mut imp_up = true;

        loop {
            tokio::select! {
                received = self.driver.receive(&mut imp_buf), if imp_up => match received {
                    Ok(words) if words > 0 => self.engine.handle_frame(&imp_buf[..2 * words]),
                    Ok(_) => {}
                    Err(err) => {
                        error!(%err, "IMP receive failed, serving applications only");
                        self.engine.imp_ready(false);
                        imp_up = false;
                    }
                },
                received = socket.recv_from(&mut app_buf) => match received {
                    Ok((len, addr)) => match addr.as_pathname() {
                        Some(client) => {
                            debug!(len, client = %client.display(), "application request");
                            let client = client.to_path_buf();
                            self.engine.handle_command(&client, &app_buf[..len]);
                        }
                        None => warn!("application request from an unbound socket"),
                    },
                    Err(err) => warn!(%err, "recvfrom error"),
                },
            }
            self.flush(&socket).await;
        }
    }

    async fn flush(&mut self, socket: &UnixDatagram) {
        for action in self.engine.take_actions() {
            match action {
                Action::SendImp(frame) => {
                    if let Err(err) = self.driver.send(frame.bytes(), frame.words()).await {
                        error!(%err, "IMP send failed");
                    }
                }
                Action::Reply { to, frame } => {
                    if let Err(err) = socket.send_to(&frame, &to).await {
                        warn!(path = %to.display(), %err, "sendto error");
                    }
                }
            }
        }
    }
}
