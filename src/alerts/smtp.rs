use crate::alerts::dispatcher::AlertTransport;
use crate::error::{AlertError, ConfigError};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::debug;
use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    25
}

/// SMTP endpoint used for alert mail
///
/// `username`/`password` and `use_tls` are independent: either may be given
/// without the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Require STARTTLS; absent means a plain connection
    #[serde(default)]
    pub use_tls: Option<bool>,
}

impl SmtpSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "smtp.server must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::ValidationError(
                "smtp.port must be between 1 and 65535".to_string(),
            ));
        }
        for (field, value) in [("smtp.from", &self.from), ("smtp.to", &self.to)] {
            value.parse::<Mailbox>().map_err(|e| {
                ConfigError::ValidationError(format!("{} '{}' is not a valid address: {}", field, value, e))
            })?;
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigError::ValidationError(
                "smtp.password requires smtp.username".to_string(),
            ));
        }
        Ok(())
    }

    fn credentials(&self) -> Option<Credentials> {
        self.username.as_ref().map(|user| {
            Credentials::new(user.clone(), self.password.clone().unwrap_or_default())
        })
    }
}

/// Blocking SMTP transport for alert notifications
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer from validated settings
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidAddress` for unparsable addresses and
    /// `AlertError::Transport` if the TLS relay cannot be configured.
    pub fn new(settings: &SmtpSettings) -> Result<Self, AlertError> {
        let from = settings
            .from
            .parse::<Mailbox>()
            .map_err(|e| AlertError::InvalidAddress(format!("{}: {}", settings.from, e)))?;
        let to = settings
            .to
            .parse::<Mailbox>()
            .map_err(|e| AlertError::InvalidAddress(format!("{}: {}", settings.to, e)))?;

        let builder = if settings.use_tls.unwrap_or(false) {
            SmtpTransport::starttls_relay(&settings.server)
                .map_err(|e| AlertError::Transport(e.to_string()))?
        } else {
            SmtpTransport::builder_dangerous(&settings.server)
        };
        let mut builder = builder.port(settings.port);
        if let Some(credentials) = settings.credentials() {
            builder = builder.credentials(credentials);
        }

        debug!(
            "Configured SMTP transport {}:{} (tls: {}, auth: {})",
            settings.server,
            settings.port,
            settings.use_tls.unwrap_or(false),
            settings.username.is_some()
        );

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }
}

impl AlertTransport for SmtpMailer {
    fn deliver(&self, subject: &str, body: &str) -> Result<(), AlertError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AlertError::Message(e.to_string()))?;

        let response = self
            .transport
            .send(&email)
            .map_err(|e| AlertError::Transport(e.to_string()))?;

        if response.is_positive() {
            Ok(())
        } else {
            Err(AlertError::Rejected(format!(
                "{} {}",
                response.code(),
                response.message().collect::<Vec<_>>().join(" ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            server: "mail.example.com".to_string(),
            port: 587,
            from: "hostlog@example.com".to_string(),
            to: "ops@example.com".to_string(),
            username: None,
            password: None,
            use_tls: None,
        }
    }

    #[test]
    fn test_valid_settings() {
        assert!(settings().validate().is_ok());
    }

    #[test]
    fn test_credentials_and_tls_are_independent() {
        let mut with_auth = settings();
        with_auth.username = Some("relay".to_string());
        with_auth.password = Some("secret".to_string());
        assert!(with_auth.validate().is_ok());
        assert!(with_auth.credentials().is_some());

        let mut with_tls = settings();
        with_tls.use_tls = Some(true);
        assert!(with_tls.validate().is_ok());
        assert!(with_tls.credentials().is_none());
    }

    #[test]
    fn test_password_without_username_is_rejected() {
        let mut s = settings();
        s.password = Some("secret".to_string());
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let mut s = settings();
        s.to = "not an address".to_string();
        assert!(s.validate().is_err());
        assert!(matches!(
            SmtpMailer::new(&s),
            Err(AlertError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_default_port_from_toml() {
        let parsed: SmtpSettings = toml::from_str(
            r#"
            server = "mail.example.com"
            from = "a@example.com"
            to = "b@example.com"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.port, 25);
        assert_eq!(parsed.use_tls, None);
    }

    #[test]
    fn test_mailer_builds_without_connecting() {
        assert!(SmtpMailer::new(&settings()).is_ok());
    }
}
