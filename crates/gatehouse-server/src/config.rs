//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Default HTTP listen address.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8080";

/// Default authentication provider.
pub const DEFAULT_AUTH_PROVIDER: &str = "basic-file";

/// Default session idle timeout in seconds (30 minutes).
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 1800;

/// Default idle timeout in seconds for sessions that never authenticated.
pub const DEFAULT_PENDING_SESSION_TIMEOUT_SECS: u64 = 120;

/// Default interval between expired-session sweeps in seconds.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "gatehouse_server=info,gatehouse_core=info";

/// Gatehouse server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,

    /// Path to the user mapping file read by the `basic-file` provider.
    pub user_mapping: Option<PathBuf>,

    /// Identifier of the authentication provider.
    pub auth_provider: String,

    /// Ordered identifiers of the event listeners attached to each session.
    pub event_listeners: Vec<String>,

    /// Idle time after which a session is discarded.
    pub session_timeout: Duration,

    /// Idle time after which a session that never authenticated is discarded.
    pub pending_session_timeout: Duration,

    /// Interval between expired-session sweeps.
    pub cleanup_interval: Duration,

    /// Mark the session cookie `Secure`, for deployments behind TLS.
    pub secure_cookie: bool,
}

impl ServerConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDRESS.to_string(),
            user_mapping: None,
            auth_provider: DEFAULT_AUTH_PROVIDER.to_string(),
            event_listeners: Vec::new(),
            session_timeout: Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS),
            pending_session_timeout: Duration::from_secs(DEFAULT_PENDING_SESSION_TIMEOUT_SECS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            secure_cookie: false,
        }
    }

    /// Set the listen address.
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Set the user mapping path.
    pub fn with_user_mapping(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_mapping = Some(path.into());
        self
    }

    /// Set the authentication provider.
    pub fn with_auth_provider(mut self, provider: impl Into<String>) -> Self {
        self.auth_provider = provider.into();
        self
    }

    /// Append an event listener.
    pub fn with_event_listener(mut self, listener: impl Into<String>) -> Self {
        self.event_listeners.push(listener.into());
        self
    }

    /// Set the session idle timeout.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set the idle timeout for sessions that have not authenticated.
    pub fn with_pending_session_timeout(mut self, timeout: Duration) -> Self {
        self.pending_session_timeout = timeout;
        self
    }

    /// Set the cleanup interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Mark the session cookie `Secure`.
    pub fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Command-line arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "gatehouse-server")]
#[command(version, about = "Gatehouse authentication server", long_about = None)]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, env = "GATEHOUSE_LISTEN", default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen: String,

    /// Path to the user mapping file.
    #[arg(short, long, env = "GATEHOUSE_USER_MAPPING")]
    pub user_mapping: Option<PathBuf>,

    /// Authentication provider.
    #[arg(long, env = "GATEHOUSE_AUTH_PROVIDER", default_value = DEFAULT_AUTH_PROVIDER)]
    pub auth_provider: String,

    /// Comma-separated event listeners, notified in order.
    #[arg(long, env = "GATEHOUSE_EVENT_LISTENERS", value_delimiter = ',')]
    pub event_listeners: Vec<String>,

    /// Session idle timeout in seconds.
    #[arg(
        long,
        env = "GATEHOUSE_SESSION_TIMEOUT",
        default_value_t = DEFAULT_SESSION_TIMEOUT_SECS
    )]
    pub session_timeout: u64,

    /// Idle timeout in seconds for sessions that never authenticated.
    #[arg(
        long,
        env = "GATEHOUSE_PENDING_SESSION_TIMEOUT",
        default_value_t = DEFAULT_PENDING_SESSION_TIMEOUT_SECS
    )]
    pub pending_session_timeout: u64,

    /// Seconds between expired-session sweeps.
    #[arg(
        long,
        env = "GATEHOUSE_CLEANUP_INTERVAL",
        default_value_t = DEFAULT_CLEANUP_INTERVAL_SECS
    )]
    pub cleanup_interval: u64,

    /// Mark the session cookie Secure (serve behind TLS).
    #[arg(long, env = "GATEHOUSE_SECURE_COOKIE")]
    pub secure_cookie: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, env = "GATEHOUSE_LOG", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
}

impl Args {
    /// Convert command-line arguments to server configuration.
    pub fn into_config(self) -> ServerConfig {
        let event_listeners = self
            .event_listeners
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();

        ServerConfig {
            listen_addr: self.listen,
            user_mapping: self.user_mapping,
            auth_provider: self.auth_provider.trim().to_string(),
            event_listeners,
            session_timeout: Duration::from_secs(self.session_timeout),
            pending_session_timeout: Duration::from_secs(self.pending_session_timeout),
            cleanup_interval: Duration::from_secs(self.cleanup_interval),
            secure_cookie: self.secure_cookie,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::new()
            .with_listen_addr("127.0.0.1:9090")
            .with_user_mapping("/etc/gatehouse/user-mapping.xml")
            .with_event_listener("audit-log")
            .with_session_timeout(Duration::from_secs(60))
            .with_pending_session_timeout(Duration::from_secs(10))
            .with_cleanup_interval(Duration::from_secs(5))
            .with_secure_cookie(true);

        assert_eq!(config.listen_addr, "127.0.0.1:9090");
        assert_eq!(
            config.user_mapping,
            Some(PathBuf::from("/etc/gatehouse/user-mapping.xml"))
        );
        assert_eq!(config.auth_provider, DEFAULT_AUTH_PROVIDER);
        assert_eq!(config.event_listeners, vec!["audit-log".to_string()]);
        assert_eq!(config.session_timeout, Duration::from_secs(60));
        assert_eq!(config.pending_session_timeout, Duration::from_secs(10));
        assert_eq!(config.cleanup_interval, Duration::from_secs(5));
        assert!(config.secure_cookie);
    }

    #[test]
    fn test_args_into_config() {
        let args = Args::try_parse_from([
            "gatehouse-server",
            "--user-mapping",
            "mapping.xml",
            "--event-listeners",
            "audit-log, ,custom",
            "--session-timeout",
            "120",
            "--cleanup-interval",
            "15",
            "--secure-cookie",
        ])
        .unwrap();

        let config = args.into_config();
        assert_eq!(config.user_mapping, Some(PathBuf::from("mapping.xml")));
        assert_eq!(config.event_listeners, vec!["audit-log", "custom"]);
        assert_eq!(config.session_timeout, Duration::from_secs(120));
        assert_eq!(config.cleanup_interval, Duration::from_secs(15));
        assert_eq!(
            config.pending_session_timeout,
            Duration::from_secs(DEFAULT_PENDING_SESSION_TIMEOUT_SECS)
        );
        assert!(config.secure_cookie);
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDRESS);
    }
}
