//! Linelog client for sending a frame and receiving the shared log

pub mod logger;

pub use logger::LogClient;
