//! Shared data types for Linelog

pub mod frame;

pub use frame::{format_timestamp_record, Frame};
