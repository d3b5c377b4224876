//! TCP accept loop and per-connection worker

use crate::config::ServerConfig;
use crate::server::frame::FrameReader;
use crate::server::registry::{Connection, DoneFlag, Registry};
use crate::server::{SharedLog, ShutdownListener};
use crate::Result;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// Pause after a failed accept so persistent errors (EMFILE) do not spin
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Where a worker is in its single request/response cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Connection accepted, nothing read yet
    Accepted,
    /// Receiving the frame
    Reading,
    /// Appending the frame to the shared log
    Appending,
    /// Reading the whole log back
    ReadingBack,
    /// Writing the log to the peer
    Sending,
    /// Connection closed
    Done,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Accepted => "accepted",
            WorkerState::Reading => "reading",
            WorkerState::Appending => "appending",
            WorkerState::ReadingBack => "reading back",
            WorkerState::Sending => "sending",
            WorkerState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Runs one connection: read a frame, append it, reply with the whole log
#[derive(Clone)]
pub struct Worker {
    log: Arc<SharedLog>,
    reader: FrameReader,
}

impl Worker {
    /// Create a worker sharing `log`
    pub fn new(log: Arc<SharedLog>, reader: FrameReader) -> Self {
        Self { log, reader }
    }

    /// Serve one request on `stream` and close it.
    ///
    /// Any failure closes the stream without a reply. Returns the number of
    /// reply bytes sent.
    pub async fn handle_connection<S>(&self, mut stream: S, peer: SocketAddr) -> Result<usize>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut state = WorkerState::Accepted;
        let result = self.serve(&mut stream, &mut state).await;

        if let Err(ref e) = result {
            warn!("Dropping connection from {} while {}: {}", peer, state, e);
        }
        drop(stream);
        info!("Closed connection from {}", peer.ip());
        result
    }

    async fn serve<S>(&self, stream: &mut S, state: &mut WorkerState) -> Result<usize>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        *state = WorkerState::Reading;
        let frame = self.reader.read_frame(stream).await?;

        *state = WorkerState::Appending;
        if !frame.is_empty() {
            self.log.append(frame.as_bytes()).await?;
        }

        *state = WorkerState::ReadingBack;
        let contents = self.log.read_all().await?;

        *state = WorkerState::Sending;
        stream.write_all(&contents).await?;
        stream.flush().await?;
        if let Err(e) = stream.shutdown().await {
            debug!("Shutdown after reply failed: {}", e);
        }

        *state = WorkerState::Done;
        Ok(contents.len())
    }
}

/// Accept loop. Owns the listener and the worker registry.
pub struct Acceptor {
    listener: TcpListener,
    worker: Worker,
    registry: Registry,
    shutdown: ShutdownListener,
}

/// What the accept loop leaves behind for the shutdown coordinator
pub struct AcceptOutcome {
    /// Connections accepted over the loop's lifetime
    pub accepted: usize,
    /// Workers not yet joined
    pub registry: Registry,
}

impl Acceptor {
    /// Create an accept loop over a bound listener
    pub fn new(
        config: &ServerConfig,
        listener: TcpListener,
        log: Arc<SharedLog>,
        shutdown: ShutdownListener,
    ) -> Self {
        let reader = FrameReader::new(config.server.recv_chunk_size)
            .with_max_frame_bytes(config.server.max_frame_bytes);

        Self {
            listener,
            worker: Worker::new(log, reader),
            registry: Registry::new(),
            shutdown,
        }
    }

    /// Accept connections until shutdown, then close the listener.
    pub async fn run(mut self) -> AcceptOutcome {
        let mut accepted = 0;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.recv() => {
                    break;
                }
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            info!("Accepted connection from {}", peer.ip());
                            accepted += 1;
                            self.spawn_worker(stream, peer);

                            let reaped = self.registry.reap_finished().await;
                            if reaped > 0 {
                                debug!("Reaped {} finished workers, {} outstanding", reaped, self.registry.len());
                            }
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            if pause_after_accept_error(&mut self.shutdown).await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        drop(self.listener);
        debug!("Listener closed after {} connections", accepted);

        AcceptOutcome {
            accepted,
            registry: self.registry,
        }
    }

    fn spawn_worker(&mut self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let worker = self.worker.clone();
        let done = DoneFlag::new();
        let flag = done.clone();

        let handle = tokio::spawn(async move {
            // the stream is closed inside handle_connection before the flag is set
            let _ = worker.handle_connection(stream, peer).await;
            flag.set();
        });

        self.registry.insert(Connection::new(peer, handle, done));
    }
}

/// Back off after an accept error. Returns true if shutdown arrived meanwhile.
async fn pause_after_accept_error(shutdown: &mut ShutdownListener) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.recv() => true,
        _ = sleep(ACCEPT_ERROR_BACKOFF) => false,
    }
}
