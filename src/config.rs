//! Webhook Configuration
//!
//! [`WebhookConfig`] gathers everything the HTTP layer needs: where to listen,
//! which path to serve, the verify token and the app secret. It can be built in
//! code, or loaded with the [`config`] crate from a TOML file and
//! `WHATSAPP_WEBHOOK__*` environment variables:
//!
//! ```text
//! WHATSAPP_WEBHOOK__ENDPOINT=0.0.0.0:8080
//! WHATSAPP_WEBHOOK__ROUTE=/whatsapp
//! WHATSAPP_WEBHOOK__VERIFY_TOKEN=meatyhamhock
//! WHATSAPP_WEBHOOK__APP_SECRET=...
//! WHATSAPP_WEBHOOK__VALIDATE_SIGNATURE=true
//! WHATSAPP_WEBHOOK__BODY_LIMIT=2097152
//! ```
//!
//! Apply it with [`ServerBuilder::from_config`] or
//! [`WebhookServiceBuilder::from_config`].
//!
//! [`ServerBuilder::from_config`]: crate::server::ServerBuilder::from_config
//! [`WebhookServiceBuilder::from_config`]: crate::webhook_service::WebhookServiceBuilder::from_config

use std::{fmt, net::SocketAddr, path::Path};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::error::Error;

/// Prefix of the environment variables read by [`WebhookConfig::from_env`].
pub const ENV_PREFIX: &str = "WHATSAPP_WEBHOOK";

const DEFAULT_ENDPOINT: ([u8; 4], u16) = ([127, 0, 0, 1], 3000);
const DEFAULT_ROUTE: &str = "/";
const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Settings for the webhook endpoint.
#[derive(Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
#[non_exhaustive]
pub struct WebhookConfig {
    /// Address the managed server binds to.
    pub endpoint: SocketAddr,

    /// Path the webhook is served on.
    pub route: String,

    /// Token for the subscription handshake. Without it, `GET` answers `405`.
    pub verify_token: Option<String>,

    /// Meta app secret, used to check `X-Hub-Signature-256`.
    pub app_secret: Option<String>,

    /// Reject `POST`s whose signature does not match. Requires `app_secret`.
    pub validate_signature: bool,

    /// Largest accepted request body, in bytes.
    pub body_limit: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint: SocketAddr::from(DEFAULT_ENDPOINT),
            route: DEFAULT_ROUTE.to_owned(),
            verify_token: None,
            app_secret: None,
            validate_signature: false,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: &Option<String>) -> &'static str {
            if value.is_some() {
                "<REDACTED>"
            } else {
                "<unset>"
            }
        }

        f.debug_struct("WebhookConfig")
            .field("endpoint", &self.endpoint)
            .field("route", &self.route)
            .field("verify_token", &redact(&self.verify_token))
            .field("app_secret", &redact(&self.app_secret))
            .field("validate_signature", &self.validate_signature)
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

impl WebhookConfig {
    /// Loads from `WHATSAPP_WEBHOOK__*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, Error> {
        Self::load(None)
    }

    /// Loads from a file (format by extension), with environment variables
    /// taking precedence.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::load(Some(path.as_ref()))
    }

    fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: WebhookConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the settings are consistent.
    ///
    /// ```rust
    /// use whatsapp_webhook_rs::config::WebhookConfig;
    ///
    /// let mut config = WebhookConfig::default();
    /// config.validate_signature = true;
    /// assert!(config.validate().is_err());
    ///
    /// config.app_secret = Some("secret".into());
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), Error> {
        if self.validate_signature && self.app_secret.as_deref().map_or(true, str::is_empty) {
            return Err(invalid("validate_signature is set but app_secret is missing"));
        }

        if !self.route.starts_with('/') {
            return Err(invalid("route must start with '/'"));
        }

        if self.body_limit == 0 {
            return Err(invalid("body_limit must be greater than zero"));
        }

        Ok(())
    }

    /// The secret to check signatures with, if checking is enabled.
    pub(crate) fn signing_secret(&self) -> Option<&str> {
        if self.validate_signature {
            self.app_secret.as_deref()
        } else {
            None
        }
    }
}

fn invalid(message: &str) -> Error {
    Error::Config(ConfigError::Message(message.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = WebhookConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.route, "/");
        assert_eq!(config.signing_secret(), None);
    }

    #[test]
    fn reads_environment() {
        temp_env::with_vars(
            [
                ("WHATSAPP_WEBHOOK__ENDPOINT", Some("0.0.0.0:8080")),
                ("WHATSAPP_WEBHOOK__ROUTE", Some("/whatsapp")),
                ("WHATSAPP_WEBHOOK__VERIFY_TOKEN", Some("meatyhamhock")),
                ("WHATSAPP_WEBHOOK__APP_SECRET", Some("shh")),
                ("WHATSAPP_WEBHOOK__VALIDATE_SIGNATURE", Some("true")),
            ],
            || {
                let config = WebhookConfig::from_env().unwrap();
                assert_eq!(config.endpoint, "0.0.0.0:8080".parse().unwrap());
                assert_eq!(config.route, "/whatsapp");
                assert_eq!(config.verify_token.as_deref(), Some("meatyhamhock"));
                assert_eq!(config.signing_secret(), Some("shh"));
                assert_eq!(config.body_limit, DEFAULT_BODY_LIMIT);
            },
        );
    }

    #[test]
    fn rejects_validation_without_secret() {
        temp_env::with_vars(
            [
                ("WHATSAPP_WEBHOOK__VALIDATE_SIGNATURE", Some("true")),
                ("WHATSAPP_WEBHOOK__APP_SECRET", None),
            ],
            || {
                let err = WebhookConfig::from_env().unwrap_err();
                assert!(matches!(err, Error::Config(_)));
            },
        );
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = WebhookConfig {
            verify_token: Some("meatyhamhock".into()),
            app_secret: Some("shh-secret".into()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("meatyhamhock"));
        assert!(!debug.contains("shh-secret"));
    }
}
