#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod agent_loop;
pub mod bridge;
pub mod config;
pub mod events;
pub mod prompt;

pub use agent_loop::{AgentEventStream, AgentLoop};
pub use bridge::{DispatchError, Route, ToolBridge, ToolRouter, flatten_contents, to_function_declarations};
pub use config::AgentConfig;
pub use events::{AgentEvent, AvailableTool, DoneReason};
