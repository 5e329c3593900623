use std::net::SocketAddr;
use std::path::PathBuf;

/// Default listen address, matching the dashboard's default backend URL.
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

/// Server settings, resolved by the CLI from flags and environment.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Path to the random-forest JSON export.
    pub model_path: PathBuf,
    pub bind: SocketAddr,
}
