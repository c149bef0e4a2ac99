//! Pattern-matched per-host overrides.
//!
//! Deployments usually carry one credential set for `router*`, another for
//! `core-*`, and so on. An [`OverrideSet`] holds already-parsed override
//! entries and fills in fields the template leaves unset for each host that
//! matches an entry's glob pattern. Parsing the override file itself (and
//! checking its permissions) is the caller's concern.

use regex::Regex;

use super::{ConfigMerge, ConnectionMethod, DEFAULT_PORT, HostConfig};
use crate::error::Result;

use secrecy::SecretString;

/// One override entry, applied to every host matching `pattern`.
#[derive(Debug, Clone)]
pub struct HostOverride {
    /// Glob-style host pattern (`*` matches any run of characters).
    pub pattern: String,

    /// Username to use when the template has none.
    pub username: Option<String>,

    /// Password to use when the template has none.
    pub password: Option<SecretString>,

    /// Privileged-mode secret to use when the template has none.
    pub enable_secret: Option<SecretString>,

    /// Connection method to use when the template is at the default.
    pub method: Option<ConnectionMethod>,

    /// Port to use when the template is at the default.
    pub port: Option<u16>,
}

impl HostOverride {
    /// Create an empty override for the given host pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            username: None,
            password: None,
            enable_secret: None,
            method: None,
            port: None,
        }
    }

    /// Set the username override.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password override.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set the privileged-mode secret override.
    pub fn with_enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Set the method override.
    pub fn with_method(mut self, method: ConnectionMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the port override.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

/// An ordered collection of [`HostOverride`] entries.
///
/// Entries are applied in order; explicit template values always win, so
/// for each field the first matching entry that carries it takes effect.
#[derive(Debug, Clone, Default)]
pub struct OverrideSet {
    entries: Vec<HostOverride>,
}

impl OverrideSet {
    /// Create an override set from already-parsed entries.
    pub fn new(entries: Vec<HostOverride>) -> Self {
        Self { entries }
    }

    /// Append an entry.
    pub fn push(&mut self, entry: HostOverride) {
        self.entries.push(entry);
    }

    /// Check whether the set holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply every matching entry to `config`, filling only unset fields.
    pub fn apply(&self, host: &str, config: &mut HostConfig) {
        for entry in &self.entries {
            if !pattern_matches(&entry.pattern, host) {
                continue;
            }
            if config.username.is_empty()
                && let Some(username) = &entry.username
            {
                config.username = username.clone();
            }
            if config.password.is_none() && entry.password.is_some() {
                config.password = entry.password.clone();
            }
            if config.enable_secret.is_none() && entry.enable_secret.is_some() {
                config.enable_secret = entry.enable_secret.clone();
            }
            // Method and port cannot distinguish "unset" from "explicitly
            // default", so overrides only apply at the default value.
            if config.method == ConnectionMethod::default()
                && let Some(method) = entry.method
            {
                config.method = method;
            }
            if config.port == DEFAULT_PORT
                && let Some(port) = entry.port
            {
                config.port = port;
            }
        }
    }
}

impl ConfigMerge for OverrideSet {
    fn resolve(&self, host: &str, template: &HostConfig) -> Result<HostConfig> {
        let mut config = template.clone();
        config.host = host.to_string();
        self.apply(host, &mut config);
        Ok(config)
    }
}

/// Match a glob-style host pattern against a hostname.
///
/// The pattern is translated to an anchored regex: literal `.` is escaped
/// and `*` becomes `.*`. A pattern that does not translate to a valid
/// regex matches nothing.
pub fn pattern_matches(pattern: &str, host: &str) -> bool {
    let translated = format!("^{}$", pattern.replace('.', r"\.").replace('*', ".*"));
    match Regex::new(&translated) {
        Ok(re) => re.is_match(host),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn glob_star_is_anchored() {
        assert!(pattern_matches("router*", "router1"));
        assert!(pattern_matches("router*", "router-edge"));
        assert!(pattern_matches("router*", "router"));
        assert!(!pattern_matches("router*", "core-router1"));
    }

    #[test]
    fn glob_dot_is_literal() {
        assert!(pattern_matches("sw*.lab.example.com", "sw7.lab.example.com"));
        assert!(!pattern_matches("sw7.lab", "sw7xlab"));
    }

    #[test]
    fn glob_exact_match() {
        assert!(pattern_matches("router1", "router1"));
        assert!(!pattern_matches("router1", "router10"));
    }

    #[test]
    fn invalid_pattern_matches_nothing() {
        assert!(!pattern_matches("router(", "router("));
    }

    #[test]
    fn apply_fills_only_unset_fields() {
        let overrides = OverrideSet::new(vec![
            HostOverride::new("router*")
                .with_username("netops")
                .with_password("from-override")
                .with_port(2222),
        ]);

        let mut config = HostConfig::new("router1").with_username("explicit");
        overrides.apply("router1", &mut config);

        assert_eq!(config.username, "explicit");
        assert_eq!(
            config.password.as_ref().unwrap().expose_secret(),
            "from-override"
        );
        assert_eq!(config.port, 2222);
    }

    #[test]
    fn first_matching_entry_wins_per_field() {
        let overrides = OverrideSet::new(vec![
            HostOverride::new("router*").with_username("first"),
            HostOverride::new("router1").with_username("second").with_port(2022),
        ]);

        let mut config = HostConfig::new("router1");
        overrides.apply("router1", &mut config);

        assert_eq!(config.username, "first");
        assert_eq!(config.port, 2022);
    }

    #[test]
    fn non_matching_entries_are_skipped() {
        let overrides = OverrideSet::new(vec![HostOverride::new("core-*").with_username("core")]);

        let mut config = HostConfig::new("router1");
        overrides.apply("router1", &mut config);

        assert!(config.username.is_empty());
    }

    #[test]
    fn resolve_sets_host() {
        let overrides = OverrideSet::default();
        let template = HostConfig::new("").with_username("netops");
        let config = overrides.resolve("router1", &template).unwrap();
        assert_eq!(config.host, "router1");
        assert_eq!(config.username, "netops");
    }
}
