//! Client side of the relay: websocket connection, long-running session and
//! per-user settings.

pub mod connection;
pub mod session;
pub mod settings;

pub use connection::{websocket_url, ChatHandle, Inbound};
pub use session::{run_session, SessionCommand, SessionConfig, SessionEvent};
pub use settings::{Settings, SettingsError};

#[cfg(test)]
#[path = "tests/test_relay.rs"]
mod test_relay;
