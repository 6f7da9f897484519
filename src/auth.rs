//! Authentication modes and credential sources.

use crate::config::Config;
use reqwest::RequestBuilder;
use std::fmt;
use url::Url;

/// How requests are authenticated
#[derive(Clone, PartialEq, Eq)]
pub enum Authentication {
    /// No credentials configured
    None,
    /// HTTP Basic with client credentials
    Basic {
        /// Client id
        client_id: String,
        /// Client secret
        client_secret: String,
    },
    /// `Authorization: Bearer <token>`
    Token(String),
}

impl Authentication {
    /// Select the mode implied by `config`. Client credentials win over a
    /// token when both are present.
    pub fn from_config(config: &Config) -> Self {
        if let (Some(client_id), Some(client_secret)) = (config.client_id(), config.client_secret()) {
            return Self::Basic {
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
            };
        }
        match config.access_token() {
            Some(token) => Self::Token(token.to_string()),
            None => Self::None,
        }
    }

    /// Whether requests carry HTTP Basic credentials
    pub fn is_basic(&self) -> bool {
        matches!(self, Self::Basic { .. })
    }

    /// Whether requests carry a bearer token
    pub fn is_token(&self) -> bool {
        matches!(self, Self::Token(_))
    }

    /// Attach credentials to an outgoing request
    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::None => request,
            Self::Basic {
                client_id,
                client_secret,
            } => request.basic_auth(client_id, Some(client_secret)),
            Self::Token(token) => request.bearer_auth(token),
        }
    }
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Basic { client_id, .. } => f
                .debug_struct("Basic")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .finish(),
            Self::Token(_) => f.debug_tuple("Token").field(&"[REDACTED]").finish(),
        }
    }
}

/// Whether `config` carries client credentials
pub fn basic_authenticated(config: &Config) -> bool {
    config.client_id().is_some() && config.client_secret().is_some()
}

/// Whether `config` carries an access token
pub fn token_authenticated(config: &Config) -> bool {
    config.access_token().is_some()
}

/// Whether `config` carries any credentials
pub fn user_authenticated(config: &Config) -> bool {
    basic_authenticated(config) || token_authenticated(config)
}

/// Login and password found in a netrc file
#[derive(Clone, PartialEq, Eq)]
pub struct NetrcCredentials {
    /// `login` token
    pub login: String,
    /// `password` token
    pub password: String,
}

impl fmt::Debug for NetrcCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetrcCredentials")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Default)]
struct NetrcEntry {
    machine: Option<String>,
    login: Option<String>,
    password: Option<String>,
}

/// Find credentials for `host` in netrc `contents`, falling back to the
/// `default` entry.
pub fn netrc_credentials(contents: &str, host: &str) -> Option<NetrcCredentials> {
    let mut entries: Vec<NetrcEntry> = Vec::new();
    let mut tokens = contents.split_whitespace();

    while let Some(token) = tokens.next() {
        match token {
            "machine" => entries.push(NetrcEntry {
                machine: tokens.next().map(str::to_string),
                ..Default::default()
            }),
            "default" => entries.push(NetrcEntry::default()),
            "login" => {
                if let (Some(entry), Some(value)) = (entries.last_mut(), tokens.next()) {
                    entry.login = Some(value.to_string());
                }
            }
            "password" => {
                if let (Some(entry), Some(value)) = (entries.last_mut(), tokens.next()) {
                    entry.password = Some(value.to_string());
                }
            }
            "account" => {
                tokens.next();
            }
            _ => {}
        }
    }

    let entry = entries
        .iter()
        .find(|e| e.machine.as_deref() == Some(host))
        .or_else(|| entries.iter().find(|e| e.machine.is_none()))?;

    Some(NetrcCredentials {
        login: entry.login.clone()?,
        password: entry.password.clone()?,
    })
}

/// Fill client credentials from the netrc file when enabled. Problems are
/// logged, never returned.
pub(crate) fn login_from_netrc(config: &mut Config) {
    if !config.netrc() {
        return;
    }

    let endpoint = config.api_endpoint();
    let host = match Url::parse(&endpoint) {
        Ok(url) => url.host_str().map(str::to_string),
        Err(err) => {
            log::warn!("Cannot read host of {}: {}", endpoint, err);
            return;
        }
    };
    let Some(host) = host else {
        return;
    };

    let contents = match std::fs::read_to_string(config.netrc_file()) {
        Ok(contents) => contents,
        Err(err) => {
            log::warn!("Cannot read netrc file {}: {}", config.netrc_file(), err);
            return;
        }
    };

    match netrc_credentials(&contents, &host) {
        Some(creds) => {
            config.set_client_id(creds.login);
            config.set_client_secret(creds.password);
        }
        None => log::warn!("Error loading credentials from netrc file for {}", endpoint),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::defaults_from(|_| None)
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(Authentication::from_config(&config()), Authentication::None);

        let token = config().with_access_token("t");
        assert!(Authentication::from_config(&token).is_token());
        assert!(token_authenticated(&token));
        assert!(!basic_authenticated(&token));

        let basic = config().with_basic_auth("id", "secret");
        assert!(Authentication::from_config(&basic).is_basic());
        assert!(user_authenticated(&basic));
    }

    #[test]
    fn test_basic_wins_when_both_present() {
        let both = config().with_basic_auth("id", "secret").with_access_token("t");
        assert!(basic_authenticated(&both));
        assert!(token_authenticated(&both));
        assert!(Authentication::from_config(&both).is_basic());
    }

    #[test]
    fn test_half_configured_basic_is_not_basic() {
        let mut only_id = config();
        only_id.set_client_id("id");
        assert!(!basic_authenticated(&only_id));
        assert_eq!(Authentication::from_config(&only_id), Authentication::None);
    }

    #[test]
    fn test_netrc_lookup() {
        let contents = "machine example.com login other password nope\n\
                        machine api.dotide.com\n  login my-id\n  password my-secret\n\
                        default login anon password guest\n";
        let creds = netrc_credentials(contents, "api.dotide.com").unwrap();
        assert_eq!(creds.login, "my-id");
        assert_eq!(creds.password, "my-secret");

        let fallback = netrc_credentials(contents, "unknown.host").unwrap();
        assert_eq!(fallback.login, "anon");

        assert!(netrc_credentials("machine a login b", "a").is_none());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let auth = Authentication::Basic {
            client_id: "id".into(),
            client_secret: "s3cret".into(),
        };
        assert!(!format!("{:?}", auth).contains("s3cret"));
        assert!(!format!("{:?}", Authentication::Token("tok3n".into())).contains("tok3n"));
    }
}
