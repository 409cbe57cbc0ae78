//! Outgoing email for one-time passwords

use anyhow::Result;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{info, warn};

use crate::models::OtpPurpose;
use crate::otp::OTP_TTL_SECONDS;

/// SMTP configuration
#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
}

impl EmailConfig {
    /// Create a new EmailConfig from environment variables
    ///
    /// # Environment Variables
    /// - `EMAIL_HOST`: SMTP relay host; email is disabled when unset
    /// - `EMAIL_PORT`: SMTP port (default: 587)
    /// - `EMAIL_USER` / `EMAIL_PASS`: SMTP credentials
    /// - `EMAIL_FROM`: sender address (default: `EMAIL_USER`)
    pub fn from_env() -> Result<Self> {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let port = match non_empty("EMAIL_PORT") {
            Some(port) => port
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid EMAIL_PORT: {}", e))?,
            None => 587,
        };

        let username = non_empty("EMAIL_USER");
        Ok(EmailConfig {
            host: non_empty("EMAIL_HOST"),
            port,
            from_address: non_empty("EMAIL_FROM").or_else(|| username.clone()),
            username,
            password: non_empty("EMAIL_PASS"),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.host.is_some() && self.from_address.is_some()
    }
}

/// Sends one-time passwords by email
#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Email a one-time password; a no-op when SMTP is not configured
    pub async fn send_otp(&self, to_email: &str, purpose: OtpPurpose, otp: &str) -> Result<()> {
        if !self.is_enabled() {
            warn!(
                "Email not configured, skipping {} code for {}",
                purpose.as_str(),
                to_email
            );
            return Ok(());
        }

        let (subject, body) = render_otp(purpose, otp);
        self.send(to_email, subject, body).await
    }

    async fn send(&self, to_email: &str, subject: &str, body: String) -> Result<()> {
        let host = self
            .config
            .host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = format!("Rideshare <{}>", from_address).parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(self.config.port);
        let mailer = match (&self.config.username, &self.config.password) {
            (Some(username), Some(password)) => {
                mailer.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => mailer,
        };

        mailer.build().send(email).await?;

        info!(to = %to_email, subject = %subject, "Email sent");
        Ok(())
    }
}

fn render_otp(purpose: OtpPurpose, otp: &str) -> (&'static str, String) {
    let minutes = OTP_TTL_SECONDS / 60;
    match purpose {
        OtpPurpose::ForgotPassword => (
            "Reset your password",
            format!(
                "Your password reset code is {otp}.\n\nIt expires in {minutes} minutes. \
                 If you did not ask to reset your password you can ignore this email."
            ),
        ),
        OtpPurpose::Verification => (
            "Verify your email",
            format!("Your email verification code is {otp}.\n\nIt expires in {minutes} minutes."),
        ),
    }
}
