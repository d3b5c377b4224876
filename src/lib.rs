//! # Linelog - Shared Line Log Server
//!
//! Linelog is a small concurrent TCP server. Every connection sends one
//! newline-terminated frame, the server appends that frame to a single
//! shared log file, and replies with the complete current contents of the log.
//!
//! ## Features
//!
//! - **Task per connection**: unbounded Tokio tasks, one request/response each
//! - **Serialized log**: one exclusive lock around every append and read-back
//! - **Periodic timestamps**: a background annotator appends timestamp records
//! - **Graceful shutdown**: in-flight connections are drained before the log file is removed
//! - **Detach mode**: optional fork into the background
//!
//! ## Quick Start
//!
//! ### Server
//! ```no_run
//! use linelog::config::ServerConfig;
//! use linelog::server::LogServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::from_file("config/server.toml")?;
//!     let server = LogServer::bind(config).await?;
//!     let report = server.run().await?;
//!     println!("served {} connections", report.connections_accepted);
//!     Ok(())
//! }
//! ```
//!
//! ### Client
//! ```no_run
//! use linelog::client::LogClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LogClient::connect("127.0.0.1:9000").await?;
//!     let log = client.exchange(b"hello\n").await?;
//!     print!("{}", String::from_utf8_lossy(&log));
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod daemon;
pub mod server;
pub mod types;

/// Common error types used throughout Linelog
pub mod error {
    use std::collections::TryReserveError;
    use std::fmt;

    /// Linelog error types
    #[derive(Debug)]
    pub enum LinelogError {
        /// I/O operation failed
        Io(std::io::Error),
        /// Configuration error
        Config(String),
        /// Server setup or teardown error
        Server(String),
        /// Client connection error
        Connection(String),
        /// An append wrote a different number of bytes than requested
        ShortWrite {
            /// Bytes the caller asked to append
            requested: usize,
            /// Bytes that actually landed in the file
            written: u64,
        },
        /// Growing a receive buffer failed
        Alloc(TryReserveError),
        /// A frame exceeded the configured maximum size
        FrameTooLarge {
            /// Configured limit in bytes
            limit: usize,
        },
        /// Forking into the background failed
        Daemon(String),
    }

    impl fmt::Display for LinelogError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                LinelogError::Io(e) => write!(f, "I/O error: {}", e),
                LinelogError::Config(e) => write!(f, "Configuration error: {}", e),
                LinelogError::Server(e) => write!(f, "Server error: {}", e),
                LinelogError::Connection(e) => write!(f, "Connection error: {}", e),
                LinelogError::ShortWrite { requested, written } => write!(
                    f,
                    "Short write: requested {} bytes, wrote {}",
                    requested, written
                ),
                LinelogError::Alloc(e) => write!(f, "Allocation error: {}", e),
                LinelogError::FrameTooLarge { limit } => {
                    write!(f, "Frame exceeds limit of {} bytes", limit)
                }
                LinelogError::Daemon(e) => write!(f, "Daemon error: {}", e),
            }
        }
    }

    impl std::error::Error for LinelogError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            match self {
                LinelogError::Io(e) => Some(e),
                LinelogError::Alloc(e) => Some(e),
                _ => None,
            }
        }
    }

    impl From<std::io::Error> for LinelogError {
        fn from(err: std::io::Error) -> Self {
            LinelogError::Io(err)
        }
    }

    impl From<TryReserveError> for LinelogError {
        fn from(err: TryReserveError) -> Self {
            LinelogError::Alloc(err)
        }
    }

    impl From<nix::Error> for LinelogError {
        fn from(err: nix::Error) -> Self {
            LinelogError::Daemon(err.to_string())
        }
    }

    /// Result type alias for Linelog operations
    pub type Result<T> = std::result::Result<T, LinelogError>;
}

pub use error::{LinelogError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::LogClient;
    pub use crate::config::{ClientConfig, ServerConfig};
    pub use crate::server::{LogServer, ShutdownHandle, ShutdownReport};
    pub use crate::types::Frame;
    pub use crate::{LinelogError, Result};
}
