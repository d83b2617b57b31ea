/// Chat API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the websocket server binds to.
    pub port: u16,
    /// Outbound buffer capacity per connected session.
    pub member_buffer: usize,
    /// Worker id baked into generated message ids.
    pub worker_id: u16,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self {
            port: env_or("PORT", 4010),
            member_buffer: env_or("MEMBER_BUFFER", 64),
            worker_id: env_or("WORKER_ID", 0),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
