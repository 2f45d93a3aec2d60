//! Outbound delivery of one-time codes and welcome messages.
//!
//! [`LogNotifier`] is the local-dev default and only logs a masked recipient.
//! [`SmtpNotifier`] sends real mail over a `lettre` async SMTP transport,
//! configured from an `smtp://` / `smtps://` URL. [`MemoryNotifier`] keeps
//! messages in memory for tests and tooling.
//!
//! Callers treat delivery as best-effort: a failed send is logged and the
//! issued code stays valid.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::info;

use super::models::OtpPurpose;

/// What the transport reported for an accepted message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryInfo {
    pub message_id: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a one-time code or return an error; callers decide whether it matters.
    async fn send_code(&self, email: &str, code: &str, purpose: OtpPurpose) -> Result<DeliveryInfo>;

    async fn send_welcome(&self, email: &str, display_name: Option<&str>) -> Result<()>;
}

/// Local dev notifier that logs instead of sending mail. The code itself is never logged.
#[derive(Clone, Debug)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_code(&self, email: &str, _code: &str, purpose: OtpPurpose) -> Result<DeliveryInfo> {
        info!(
            to_email = %mask_email(email),
            ?purpose,
            "one-time code send stub"
        );
        Ok(DeliveryInfo::default())
    }

    async fn send_welcome(&self, email: &str, _display_name: Option<&str>) -> Result<()> {
        info!(to_email = %mask_email(email), "welcome email send stub");
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentCode {
    pub email: String,
    pub code: String,
    pub purpose: OtpPurpose,
}

/// Captures outgoing messages instead of delivering them.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    codes: Mutex<Vec<SentCode>>,
    welcomes: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail (the message is still captured).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn last_code(&self, email: &str) -> Option<String> {
        self.sent_codes()
            .into_iter()
            .rev()
            .find(|sent| sent.email == email)
            .map(|sent| sent.code)
    }

    #[must_use]
    pub fn sent_codes(&self) -> Vec<SentCode> {
        self.codes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn welcomes(&self) -> Vec<String> {
        self.welcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send_code(&self, email: &str, code: &str, purpose: OtpPurpose) -> Result<DeliveryInfo> {
        self.codes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentCode {
                email: email.to_string(),
                code: code.to_string(),
                purpose,
            });
        if self.failing.load(Ordering::SeqCst) {
            bail!("delivery disabled");
        }
        Ok(DeliveryInfo::default())
    }

    async fn send_welcome(&self, email: &str, _display_name: Option<&str>) -> Result<()> {
        self.welcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email.to_string());
        if self.failing.load(Ordering::SeqCst) {
            bail!("delivery disabled");
        }
        Ok(())
    }
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    code_ttl_minutes: u64,
}

impl SmtpNotifier {
    /// # Errors
    /// Returns an error if the SMTP URL or sender address is invalid.
    pub fn new(smtp_url: &str, from: &str, code_ttl_minutes: u64) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::from_url(smtp_url)
            .context("Failed to configure SMTP transport")?
            .build();
        let from = from
            .parse::<Mailbox>()
            .context("Invalid SMTP sender address")?;
        Ok(Self {
            transport,
            from,
            code_ttl_minutes,
        })
    }

    async fn deliver(&self, email: &str, subject: &str, text: String, html: String) -> Result<String> {
        let to = email
            .parse::<Mailbox>()
            .context("Invalid recipient email address")?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(text, html))
            .context("Failed to build email message")?;

        let response = self
            .transport
            .send(message)
            .await
            .context("Failed to send email")?;
        Ok(response.message().collect::<Vec<_>>().join(" "))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_code(&self, email: &str, code: &str, purpose: OtpPurpose) -> Result<DeliveryInfo> {
        let (text, html) = code_bodies(code, purpose, self.code_ttl_minutes);
        let reply = self
            .deliver(email, code_subject(purpose), text, html)
            .await?;
        info!(to_email = %mask_email(email), ?purpose, "one-time code sent");
        Ok(DeliveryInfo {
            message_id: Some(reply).filter(|reply| !reply.is_empty()),
        })
    }

    async fn send_welcome(&self, email: &str, display_name: Option<&str>) -> Result<()> {
        let (text, html) = welcome_bodies(display_name);
        self.deliver(email, "Welcome to Ballot!", text, html).await?;
        info!(to_email = %mask_email(email), "welcome email sent");
        Ok(())
    }
}

fn code_subject(purpose: OtpPurpose) -> &'static str {
    match purpose {
        OtpPurpose::Register => "Welcome to Ballot - your sign-up code",
        OtpPurpose::Login => "Your Ballot login code",
    }
}

fn code_bodies(code: &str, purpose: OtpPurpose, ttl_minutes: u64) -> (String, String) {
    let intro = match purpose {
        OtpPurpose::Register => "Thanks for signing up. Use this code to finish creating your account:",
        OtpPurpose::Login => "Use this code to sign in:",
    };
    let text = format!(
        "{intro}\n\n{code}\n\nThe code expires in {ttl_minutes} minutes. Never share it with anyone.\nIf you didn't request it, ignore this email."
    );
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: sans-serif; color: #333;">
    <p>{intro}</p>
    <p style="font-size: 32px; letter-spacing: 8px; font-weight: bold;">{code}</p>
    <p>The code expires in {ttl_minutes} minutes. Never share it with anyone.</p>
    <p style="color: #999; font-size: 12px;">If you didn't request it, ignore this email.</p>
</body>
</html>"#
    );
    (text, html)
}

fn welcome_bodies(display_name: Option<&str>) -> (String, String) {
    let greeting = display_name.map_or_else(
        || "Welcome to Ballot!".to_string(),
        |name| format!("Welcome {name}!"),
    );
    let text = format!(
        "{greeting}\n\nYour account is ready. Create polls, vote on community polls and share them with friends."
    );
    let html = format!(
        "<h1>{greeting}</h1><p>Your account is ready.</p><ul><li>Create polls</li><li>Vote on community polls</li><li>Share polls with friends</li></ul>"
    );
    (text, html)
}

/// `alice@example.com` -> `a***@example.com`, for logs.
#[must_use]
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_email_keeps_domain_only() {
        assert_eq!(mask_email("alice@example.com"), "a***@example.com");
        assert_eq!(mask_email("@example.com"), "***@example.com");
        assert_eq!(mask_email("garbage"), "***");
    }

    #[test]
    fn subjects_depend_on_purpose() {
        assert_ne!(
            code_subject(OtpPurpose::Login),
            code_subject(OtpPurpose::Register)
        );
    }

    #[test]
    fn code_bodies_include_code_and_ttl() {
        let (text, html) = code_bodies("123456", OtpPurpose::Login, 10);
        assert!(text.contains("123456"));
        assert!(text.contains("10 minutes"));
        assert!(html.contains("123456"));
    }

    #[test]
    fn welcome_uses_name_when_present() {
        assert!(welcome_bodies(Some("Vera")).0.starts_with("Welcome Vera!"));
        assert!(welcome_bodies(None).0.starts_with("Welcome to Ballot!"));
    }

    #[test]
    fn smtp_notifier_rejects_bad_sender() {
        assert!(SmtpNotifier::new("smtp://localhost:2525", "not an address", 10).is_err());
        assert!(SmtpNotifier::new("smtp://localhost:2525", "Ballot <no-reply@ballot.dev>", 10).is_ok());
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let notifier = LogNotifier;
        let info = notifier
            .send_code("a@example.com", "123456", OtpPurpose::Register)
            .await;
        assert!(matches!(info, Ok(DeliveryInfo { message_id: None })));
        assert!(notifier.send_welcome("a@example.com", None).await.is_ok());
    }

    #[tokio::test]
    async fn memory_notifier_captures_and_can_fail() {
        let notifier = MemoryNotifier::new();
        assert!(notifier
            .send_code("a@example.com", "111111", OtpPurpose::Login)
            .await
            .is_ok());
        notifier.set_failing(true);
        assert!(notifier
            .send_code("a@example.com", "222222", OtpPurpose::Login)
            .await
            .is_err());
        assert!(notifier.send_welcome("a@example.com", None).await.is_err());

        assert_eq!(notifier.last_code("a@example.com").as_deref(), Some("222222"));
        assert_eq!(notifier.sent_codes().len(), 2);
        assert_eq!(notifier.welcomes(), vec!["a@example.com".to_string()]);
        assert!(notifier.last_code("b@example.com").is_none());
    }
}
