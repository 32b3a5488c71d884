//! HTTP API layer for the emulated device.
//!
//! This module contains the router construction and server startup. The
//! handlers themselves live in [`http`] and only translate between HTTP and the
//! [`Switch`] capability.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::switch::Switch;
use crate::wemo::DeviceInfo;

pub mod http;

pub use http::create_router;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind the TCP listener.
    #[error("could not start tcp listener: {0}")]
    Bind(#[source] io::Error),

    /// The serve loop exited with an error.
    #[error("http server failed: {0}")]
    Serve(#[source] io::Error),

    /// The server task panicked or was aborted.
    #[error("http server task failed: {0}")]
    Task(String),
}

/// Shared application state for the API layer.
#[derive(Clone)]
pub struct AppState {
    /// The controlled device.
    pub switch: Arc<dyn Switch>,
    /// Identity published in the description document.
    pub device: Arc<DeviceInfo>,
    /// Normalized URI prefix (`""` or `/segment...`).
    pub prefix: Arc<str>,
}

impl AppState {
    pub fn new(switch: Arc<dyn Switch>, device: DeviceInfo, prefix: &str) -> Self {
        Self {
            switch,
            device: Arc::new(device),
            prefix: Arc::from(prefix),
        }
    }
}

/// Handle to a running HTTP server task.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<Result<(), ServerError>>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns true once the serve loop has exited, cleanly or not.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Requests a graceful shutdown without waiting for it.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Requests a graceful shutdown and waits up to `grace` for the serve loop
    /// to exit. The task is aborted if it does not finish in time.
    pub async fn shutdown_and_join(
        self,
        grace: std::time::Duration,
    ) -> Result<(), ServerError> {
        self.shutdown.cancel();

        let mut task = self.task;
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ServerError::Task(e.to_string())),
            Err(_) => {
                log::warn!(
                    "[Server] Graceful shutdown exceeded {:?}, aborting",
                    grace
                );
                task.abort();
                Ok(())
            }
        }
    }
}

/// Binds a TCP listener on `addr`.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr).await.map_err(ServerError::Bind)
}

/// Serves the emulation endpoints on `listener` in a background task.
///
/// The server runs until `shutdown` is cancelled, after which in-flight
/// requests are allowed to finish. A serve error is logged and also returned
/// through the handle.
pub fn spawn_server(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<ServerHandle, ServerError> {
    let local_addr = listener.local_addr().map_err(ServerError::Bind)?;
    let app = create_router(state);
    let token = shutdown.clone();

    let task = tokio::spawn(async move {
        log::info!("[Server] Listening on http://{}", local_addr);
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(token.cancelled_owned())
            .await;

        match result {
            Ok(()) => {
                log::info!("[Server] Stopped");
                Ok(())
            }
            Err(e) => {
                log::error!("[Server] Serve loop failed: {}", e);
                Err(ServerError::Serve(e))
            }
        }
    });

    Ok(ServerHandle {
        local_addr,
        shutdown,
        task,
    })
}
