/// Outbound email boundary
///
/// Sign-in links are delivered through an external transactional email
/// service. The service is reached through the [`EmailSender`] trait so the
/// rest of the crate never depends on a concrete provider:
///
/// - [`HttpEmailSender`]: JSON POST to a transactional email API with a bearer key
/// - [`LogEmailSender`]: writes the link to the log (development)
///
/// Delivery is attempted exactly once. Failures are returned to the caller.
///
/// # Example
///
/// ```no_run
/// use cofound_shared::email::{EmailSender, HttpEmailSender, HttpEmailConfig, SignInEmail};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let sender = HttpEmailSender::new(HttpEmailConfig {
///     api_url: "https://api.resend.com/emails".to_string(),
///     api_key: "re_...".to_string(),
///     from: "Cofound <login@cofound.dev>".to_string(),
/// })?;
///
/// sender
///     .send_sign_in_link(&SignInEmail {
///         email: "ada@example.com".to_string(),
///         url: "https://cofound.dev/api/auth/magic-link/verify?token=...".to_string(),
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Email delivery errors
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// Could not reach the provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider answered with a non-success status
    #[error("Provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Payload handed to the email boundary when a sign-in token is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignInEmail {
    /// Recipient address
    pub email: String,

    /// Magic link the recipient clicks to sign in
    pub url: String,
}

/// Email boundary
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Delivers a sign-in link
    async fn send_sign_in_link(&self, message: &SignInEmail) -> Result<(), EmailError>;
}

/// Transactional email API settings
#[derive(Debug, Clone)]
pub struct HttpEmailConfig {
    /// Endpoint accepting `{from, to, subject, html, text}` JSON
    pub api_url: String,

    /// Bearer token for the provider
    pub api_key: String,

    /// Sender address
    pub from: String,
}

/// Sends email through a transactional email HTTP API
#[derive(Debug, Clone)]
pub struct HttpEmailSender {
    client: reqwest::Client,
    config: HttpEmailConfig,
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: String,
    text: String,
}

impl HttpEmailSender {
    /// Creates a sender with a 10 second request timeout
    pub fn new(config: HttpEmailConfig) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send_sign_in_link(&self, message: &SignInEmail) -> Result<(), EmailError> {
        let body = OutboundMessage {
            from: &self.config.from,
            to: [&message.email],
            subject: "Sign in to Cofound",
            html: sign_in_html(&message.url),
            text: sign_in_text(&message.url),
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Email provider rejected sign-in email");
            return Err(EmailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("Sign-in email accepted by provider");
        Ok(())
    }
}

/// Logs sign-in links instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_sign_in_link(&self, message: &SignInEmail) -> Result<(), EmailError> {
        info!(email = %message.email, url = %message.url, "Sign-in link (email delivery disabled)");
        Ok(())
    }
}

fn sign_in_text(url: &str) -> String {
    format!("Sign in to Cofound\n\n{}\n\nIf you did not request this email you can safely ignore it.\n", url)
}

fn sign_in_html(url: &str) -> String {
    format!(
        "<p>Click the link below to sign in to Cofound.</p>\
         <p><a href=\"{url}\">Sign in</a></p>\
         <p>If you did not request this email you can safely ignore it.</p>"
    )
}
