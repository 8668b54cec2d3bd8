//! Connection manager, WebSocket transport and CLI
//!
//! This crate provides the `livechat` command-line client and the
//! [`ConnectionManager`] that drives it.

pub mod cli;
pub mod commands;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod heartbeat;
pub mod signals;
pub mod state;
pub mod transport;

pub use cli::Cli;
pub use config::{ClientSettings, ConnectionConfig, HostAddr};
pub use connection::{ConnectionManager, ManagerSettings, SessionEnd};
pub use credentials::{CredentialSource, HttpCredentialSource, StaticCredentials};
pub use error::{ClientError, ClientResult};
pub use heartbeat::HeartbeatScheduler;
pub use signals::CloseHandle;
pub use state::{ConnectionState, Transition};
pub use transport::{Connector, SocketReader, SocketWriter, WsConnector};
