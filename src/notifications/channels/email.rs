//! SMTP email channel

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{resolve_target, Channel, ChannelError, ChannelResult, DeliveryReceipt};
use crate::models::ChannelKind;
use crate::notifications::Notification;

/// Connection security for the SMTP session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS (port 587)
    #[default]
    Starttls,
    /// Implicit TLS (port 465)
    Tls,
    /// No encryption, for local relays and test servers
    None,
}

/// Email channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub security: SmtpSecurity,
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            username: None,
            password: None,
            from_address: "noreply@aquaregwatch.no".to_string(),
            from_name: "AquaRegWatch Norway".to_string(),
            security: SmtpSecurity::Starttls,
            timeout_secs: 30,
        }
    }
}

impl EmailConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.smtp_host.trim().is_empty() {
            return Err("SMTP host must not be empty".to_string());
        }
        if self.smtp_port == 0 {
            return Err("SMTP port must be greater than 0".to_string());
        }
        self.from_address
            .parse::<Address>()
            .map_err(|e| format!("Invalid from address '{}': {e}", self.from_address))?;
        if self.username.is_some() != self.password.is_some() {
            return Err("SMTP username and password must be set together".to_string());
        }
        Ok(())
    }
}

/// Email notification channel
///
/// Sends plain-text mail to the recipient's first `email` target.
pub struct EmailChannel {
    config: EmailConfig,
    from: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailChannel {
    /// Create the channel and its SMTP transport
    ///
    /// No connection is made until the first delivery.
    pub fn new(config: EmailConfig) -> ChannelResult<Self> {
        config.validate().map_err(ChannelError::InvalidConfig)?;

        let address = config
            .from_address
            .parse::<Address>()
            .map_err(|e| ChannelError::InvalidConfig(e.to_string()))?;
        let from = Mailbox::new(Some(config.from_name.clone()), address);

        let mut builder = match config.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .map_err(|e| ChannelError::Smtp(e.to_string()))?,
            SmtpSecurity::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                    .map_err(|e| ChannelError::Smtp(e.to_string()))?
            }
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            }
        }
        .port(config.smtp_port)
        .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
            config,
        })
    }

    fn build_message(&self, to: &str, notification: &Notification) -> ChannelResult<Message> {
        let address = to.parse::<Address>().map_err(|e| {
            ChannelError::Unavailable(format!("invalid email target '{to}': {e}"))
        })?;
        let name = (!notification.recipient_name.is_empty())
            .then(|| notification.recipient_name.clone());

        Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(name, address))
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(|e| ChannelError::Smtp(e.to_string()))
    }
}

#[async_trait]
impl Channel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn deliver(&self, notification: &Notification) -> ChannelResult<DeliveryReceipt> {
        let to = resolve_target(notification, ChannelKind::Email, None)?;
        let message = self.build_message(to, notification)?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| ChannelError::Smtp(e.to_string()))?;

        tracing::info!(to = %to, recipient = %notification.recipient, "Email sent");
        Ok(DeliveryReceipt::new("email").with_detail(to))
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name(),
            "smtp_host": self.config.smtp_host,
            "smtp_port": self.config.smtp_port,
            "security": self.config.security,
            "from": self.config.from_address,
            "has_auth": self.config.username.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelDescriptor;
    use crate::notifications::Alert;

    fn plain_config() -> EmailConfig {
        EmailConfig {
            smtp_host: "127.0.0.1".to_string(),
            smtp_port: 2525,
            security: SmtpSecurity::None,
            ..Default::default()
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(EmailConfig::default().validate().is_ok());

        let bad_from = EmailConfig {
            from_address: "not-an-address".to_string(),
            ..Default::default()
        };
        assert!(bad_from.validate().is_err());

        let half_auth = EmailConfig {
            username: Some("user".to_string()),
            ..Default::default()
        };
        assert!(half_auth.validate().is_err());
    }

    #[test]
    fn test_security_parses_lowercase() {
        let config: EmailConfig = toml::from_str("security = \"tls\"\nsmtp_port = 465").unwrap();
        assert_eq!(config.security, SmtpSecurity::Tls);
        assert_eq!(config.smtp_port, 465);
        assert_eq!(config.from_name, "AquaRegWatch Norway");
    }

    #[tokio::test]
    async fn test_missing_email_target_is_unavailable() {
        let channel = EmailChannel::new(plain_config()).unwrap();
        let notification = Notification::for_alert(&Alert::source_recovered("fdir"), &[]);
        let err = channel.deliver(&notification).await.unwrap_err();
        assert!(matches!(err, ChannelError::Unavailable(_)));
    }

    #[test]
    fn test_message_headers() {
        let channel = EmailChannel::new(plain_config()).unwrap();
        let targets = [ChannelDescriptor::new(ChannelKind::Email, "ops@salmon.no")];
        let notification = Notification::for_alert(&Alert::source_recovered("fdir"), &targets);

        let message = channel.build_message("ops@salmon.no", &notification).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: operator <ops@salmon.no>"));
        assert!(raw.contains("noreply@aquaregwatch.no"));

        assert!(matches!(
            channel.build_message("nope", &notification),
            Err(ChannelError::Unavailable(_))
        ));
    }
}
