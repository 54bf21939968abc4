#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod client;
pub mod config_store;
pub mod manager;
pub mod protocol;
pub mod service;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::{
    CapabilityList, ClientInfo, McpClientError, McpSession, SessionOptions, Unsupported,
    collapse,
};
pub use config_store::{InMemoryConfigRepository, JsonFileConfigRepository};
pub use manager::McpManager;
pub use service::{McpServerInfo, McpService};
pub use transport::{
    DefaultTransportFactory, Transport, TransportError, TransportFactory, TransportHandle,
};
