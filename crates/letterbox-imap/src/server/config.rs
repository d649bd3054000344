//! Server listener configuration.

/// Transport security mode for the listener.
///
/// Only plaintext is implemented; STARTTLS is advertised nowhere and the
/// verb is always answered `BAD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended outside trusted
    /// networks or test rigs.**
    #[default]
    None,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 143,
        }
    }
}

/// IMAP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub addr: String,
    /// Listener port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
}

impl ServerConfig {
    /// Creates a configuration bound to `::1` on the given port.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            addr: "::1".to_string(),
            port,
            security: Security::None,
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(Security::None.default_port())
    }
}

/// Builder for server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfigBuilder {
    addr: Option<String>,
    port: Option<u16>,
    security: Security,
}

impl ServerConfigBuilder {
    /// Creates a new builder with defaults (`::1`, port by security mode).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bind address.
    #[must_use]
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Sets the listener port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            addr: self.addr.unwrap_or_else(|| "::1".to_string()),
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port() {
        assert_eq!(Security::None.default_port(), 143);
    }

    #[test]
    fn test_config_new() {
        let config = ServerConfig::new(1433);
        assert_eq!(config.addr, "::1");
        assert_eq!(config.port, 1433);
        assert_eq!(config.security, Security::None);
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::builder().addr("127.0.0.1").port(1143).build();
        assert_eq!(config.addr, "127.0.0.1");
        assert_eq!(config.port, 1143);
    }

    #[test]
    fn test_builder_default_port_from_security() {
        let config = ServerConfig::builder().build();
        assert_eq!(config.port, 143);
        assert_eq!(config.addr, "::1");
    }
}
