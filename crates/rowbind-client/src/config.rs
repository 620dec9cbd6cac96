//! Client configuration.

use std::fmt;

use rowbind_driver::IsolationLevel;

use crate::error::{Error, Result};

/// Default number of rows per bulk fetch.
pub const DEFAULT_FETCH_SIZE: usize = 128;

/// Configuration for opening connections.
///
/// The connection string is handed to the driver unchanged; the remaining
/// options are applied by the client after the connection is open.
#[derive(Clone)]
pub struct Config {
    connection_string: String,
    attributes: Vec<(String, String)>,

    /// Isolation level applied to new connections, if any.
    pub isolation_level: Option<IsolationLevel>,

    /// Whether new connections are opened in read-only access mode.
    pub read_only: bool,

    /// Rows per driver round trip for bulk result statements.
    pub fetch_size: usize,
}

impl Config {
    /// Parse an ODBC-style connection string into configuration.
    ///
    /// ```text
    /// DSN=orders;UID=app;PWD={se;cret};
    /// ```
    ///
    /// Values wrapped in braces may contain `;`. Keys are matched
    /// case-insensitively by [`attribute`](Self::attribute).
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        let attributes = parse_attributes(conn_str)?;
        Ok(Self {
            connection_string: conn_str.to_string(),
            attributes,
            isolation_level: None,
            read_only: false,
            fetch_size: DEFAULT_FETCH_SIZE,
        })
    }

    /// The connection string as given.
    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Look up a connection string attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Set the isolation level applied to new connections.
    #[must_use]
    pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    /// Open new connections in read-only access mode.
    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Set the default bulk fetch size.
    #[must_use]
    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.fetch_size == 0 {
            return Err(Error::Config("fetch_size must be greater than 0".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted: Vec<String> = self
            .attributes
            .iter()
            .map(|(k, v)| {
                if k.eq_ignore_ascii_case("pwd") || k.eq_ignore_ascii_case("password") {
                    format!("{k}=***")
                } else {
                    format!("{k}={v}")
                }
            })
            .collect();
        f.debug_struct("Config")
            .field("connection_string", &redacted.join(";"))
            .field("isolation_level", &self.isolation_level)
            .field("read_only", &self.read_only)
            .field("fetch_size", &self.fetch_size)
            .finish()
    }
}

fn parse_attributes(conn_str: &str) -> Result<Vec<(String, String)>> {
    let mut attributes = Vec::new();
    let mut rest = conn_str;

    loop {
        rest = rest.trim_start_matches([';', ' ', '\t']);
        if rest.is_empty() {
            break;
        }

        let (key, after_key) = rest
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("invalid key-value: {rest}")))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Config(format!("missing key before '=' in: {rest}")));
        }

        let after_key = after_key.trim_start();
        let (value, remainder) = if let Some(braced) = after_key.strip_prefix('{') {
            let (value, remainder) = braced
                .split_once('}')
                .ok_or_else(|| Error::Config(format!("unterminated '{{' in value of {key}")))?;
            let remainder = remainder.trim_start();
            if !remainder.is_empty() && !remainder.starts_with(';') {
                return Err(Error::Config(format!(
                    "unexpected text after braced value of {key}"
                )));
            }
            (value, remainder)
        } else {
            match after_key.split_once(';') {
                Some((value, remainder)) => (value.trim_end(), remainder),
                None => (after_key.trim_end(), ""),
            }
        };

        attributes.push((key.to_string(), value.to_string()));
        rest = remainder;
    }

    Ok(attributes)
}
