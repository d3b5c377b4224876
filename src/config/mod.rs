//! Configuration management for Linelog

pub mod settings;

pub use settings::{
    AnnotatorSettings, ClientConfig, ServerConfig, ServerSettings, StorageSettings,
};
