use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use secrecy::ExposeSecret;
use std::time::Duration;

use super::otp::OtpChallenge;
use crate::config::SmtpConfig;
use crate::models::{Identifier, User};
use crate::utils::Password;

/// Out-of-band delivery of secrets (SMS, email). Transport and retry policy
/// belong to the implementation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_otp(&self, challenge: &OtpChallenge) -> Result<(), anyhow::Error>;

    async fn send_initial_password(
        &self,
        user: &User,
        password: &Password,
    ) -> Result<(), anyhow::Error>;
}

/// Records that a dispatch happened without ever logging the secret.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_otp(&self, challenge: &OtpChallenge) -> Result<(), anyhow::Error> {
        tracing::info!(
            identifier_kind = challenge.identifier.kind(),
            expires_at = %challenge.expires_at,
            "OTP ready for dispatch"
        );
        Ok(())
    }

    async fn send_initial_password(
        &self,
        user: &User,
        _password: &Password,
    ) -> Result<(), anyhow::Error> {
        tracing::info!(user_id = %user.user_id, "Initial password ready for dispatch");
        Ok(())
    }
}

/// Mails OTP codes and initial passwords over an SMTP relay.
///
/// There is no SMS transport, so challenges for phone identifiers fall back
/// to [`LogNotifier`].
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: SmtpTransport,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, anyhow::Error> {
        let creds = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().clone(),
        );

        let mailer = SmtpTransport::starttls_relay(&config.host)?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();
        let from = config.from_email.parse::<Mailbox>()?;

        tracing::info!(host = %config.host, port = config.port, "SMTP notifier initialized");

        Ok(Self { mailer, from })
    }

    async fn send_email(&self, to: &str, subject: &str, body: String) -> Result<(), anyhow::Error> {
        let email = build_message(&self.from, to, subject, body)?;

        // SmtpTransport blocks; keep it off the runtime threads.
        let mailer = self.mailer.clone();
        tokio::task::spawn_blocking(move || mailer.send(&email)).await??;

        tracing::info!(subject = %subject, "Email sent");
        Ok(())
    }
}

fn build_message(
    from: &Mailbox,
    to: &str,
    subject: &str,
    body: String,
) -> Result<Message, anyhow::Error> {
    Ok(Message::builder()
        .from(from.clone())
        .to(to.parse::<Mailbox>()?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body)?)
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_otp(&self, challenge: &OtpChallenge) -> Result<(), anyhow::Error> {
        match &challenge.identifier {
            Identifier::Email(address) => {
                let body = format!(
                    "Your verification code is {}.\n\nIt expires at {}. If you did not ask for it, ignore this email.",
                    challenge.code,
                    challenge.expires_at.format("%Y-%m-%d %H:%M UTC"),
                );
                self.send_email(address, "Your verification code", body).await
            }
            Identifier::Phone(_) => LogNotifier.send_otp(challenge).await,
        }
    }

    async fn send_initial_password(
        &self,
        user: &User,
        password: &Password,
    ) -> Result<(), anyhow::Error> {
        let Some(address) = user.email.as_deref() else {
            anyhow::bail!("account {} has no email address", user.user_id);
        };
        let body = format!(
            "An administrator account was created for you.\n\nTemporary password: {}\n\nChange it after your first login.",
            password.as_str(),
        );
        self.send_email(address, "Your administrator account", body).await
    }
}
