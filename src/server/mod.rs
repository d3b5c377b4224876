//! Linelog server implementation

pub mod annotator;
pub mod frame;
pub mod registry;
pub mod shutdown;
pub mod storage;
pub mod tcp;

use crate::config::ServerConfig;
use crate::{LinelogError, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub use annotator::Annotator;
pub use frame::FrameReader;
pub use registry::{Connection, DoneFlag, Registry};
pub use shutdown::{trigger_on_signal, ShutdownHandle, ShutdownListener};
pub use storage::SharedLog;
pub use tcp::{Acceptor, Worker, WorkerState};

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Connections accepted before shutdown
    pub connections_accepted: usize,
    /// Workers joined, during steady-state reaping and the final drain
    pub workers_joined: usize,
    /// Timestamp records appended by the annotator
    pub timestamps_appended: usize,
    /// Whether the backing file was deleted
    pub data_file_removed: bool,
}

/// Bind the listening socket without a runtime, so setup errors surface
/// before the process detaches.
pub fn bind_listener(config: &ServerConfig) -> Result<std::net::TcpListener> {
    config.validate()?;

    let address = config.listen_address();
    let listener = std::net::TcpListener::bind(&address)
        .map_err(|e| LinelogError::Server(format!("Failed to bind {}: {}", address, e)))?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Server context: listener, shared log and shutdown switch for one instance
pub struct LogServer {
    config: ServerConfig,
    listener: TcpListener,
    log: Arc<SharedLog>,
    shutdown: ShutdownHandle,
}

impl LogServer {
    /// Bind and open everything the configuration describes
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = bind_listener(&config)?;
        Self::from_listener(config, listener).await
    }

    /// Build a server around an already bound listener
    pub async fn from_listener(
        config: ServerConfig,
        listener: std::net::TcpListener,
    ) -> Result<Self> {
        config.validate()?;

        listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(listener)
            .map_err(|e| LinelogError::Server(format!("Failed to register listener: {}", e)))?;
        let log = Arc::new(SharedLog::new(&config).await?);

        Ok(Self {
            config,
            listener,
            log,
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle that stops [`run`](Self::run) when triggered
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Path of the shared log file
    pub fn data_file(&self) -> &Path {
        self.log.path()
    }

    /// Serve until shutdown, then drain workers and remove the log file
    pub async fn run(self) -> Result<ShutdownReport> {
        let LogServer {
            config,
            listener,
            log,
            shutdown,
        } = self;
        let data_file = log.path().to_path_buf();

        info!("Listening on {}", listener.local_addr()?);

        let annotator = if config.annotator.enabled {
            let annotator = Annotator::new(&config, Arc::clone(&log));
            Some(tokio::spawn(annotator.run(shutdown.listener())))
        } else {
            None
        };

        let acceptor = Acceptor::new(&config, listener, Arc::clone(&log), shutdown.listener());
        let outcome = acceptor.run().await;

        info!("Shutting down, waiting for {} workers", outcome.registry.len());

        let timestamps_appended = match annotator {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                warn!("Annotator did not finish cleanly: {}", e);
                0
            }),
            None => 0,
        };

        let mut registry = outcome.registry;
        registry.drain().await;

        let data_file_removed = if config.storage.remove_on_shutdown {
            Self::remove_data_file(log, &data_file).await
        } else {
            false
        };

        Ok(ShutdownReport {
            connections_accepted: outcome.accepted,
            workers_joined: registry.joined(),
            timestamps_appended,
            data_file_removed,
        })
    }

    async fn remove_data_file(log: Arc<SharedLog>, data_file: &Path) -> bool {
        let result = match Arc::try_unwrap(log) {
            Ok(log) => log.remove().await,
            Err(_) => {
                warn!("Shared log still referenced at shutdown, removing by path");
                tokio::fs::remove_file(data_file).await.map_err(LinelogError::from)
            }
        };

        match result {
            Ok(()) => {
                info!("Removed {}", data_file.display());
                true
            }
            Err(e) => {
                error!("Failed to remove data file: {}", e);
                false
            }
        }
    }
}
