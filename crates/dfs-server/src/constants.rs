//! Server configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

/// Default TCP port for the file server.
pub const DEFAULT_PORT: u16 = 1024;

/// Default bind address (localhost only).
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Seconds between abandoned-lock sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Directory under the user config dir holding `server.toml`.
pub const CONFIG_DIR_NAME: &str = "dfs";

pub const CONFIG_FILE_NAME: &str = "server.toml";
