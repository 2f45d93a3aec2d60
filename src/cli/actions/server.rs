use crate::api::{self, AuthConfig, EmailConfig, Secrets};
use anyhow::Result;
use secrecy::SecretString;
use tracing::debug;

pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub frontend_base_url: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: u64,
    pub session_issuer: String,
    pub otp_ttl_seconds: u64,
    pub otp_rate_limit_window_seconds: u64,
    pub otp_rate_limit_max: usize,
    pub otp_bypass_code: Option<SecretString>,
    pub smtp_url: Option<SecretString>,
    pub smtp_from: String,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &self.dsn.as_ref().map(|_| "***"))
            .field("frontend_base_url", &self.frontend_base_url)
            .field("session_secret", &"***")
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("session_issuer", &self.session_issuer)
            .field("otp_ttl_seconds", &self.otp_ttl_seconds)
            .field(
                "otp_rate_limit_window_seconds",
                &self.otp_rate_limit_window_seconds,
            )
            .field("otp_rate_limit_max", &self.otp_rate_limit_max)
            .field(
                "otp_bypass_code",
                &self.otp_bypass_code.as_ref().map(|_| "***"),
            )
            .field("smtp_url", &self.smtp_url.as_ref().map(|_| "***"))
            .field("smtp_from", &self.smtp_from)
            .finish()
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store, mailer or listener cannot be set up.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let auth_config = AuthConfig::new(args.frontend_base_url)
        .with_otp_ttl_seconds(args.otp_ttl_seconds)
        .with_rate_limit_window_seconds(args.otp_rate_limit_window_seconds)
        .with_rate_limit_max(args.otp_rate_limit_max)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_session_issuer(args.session_issuer);

    let email_config = EmailConfig::new(args.smtp_from).with_smtp_url(args.smtp_url);

    let secrets = Secrets {
        session_secret: args.session_secret,
        bypass_code: args.otp_bypass_code,
    };

    api::new(args.port, args.dsn, auth_config, email_config, secrets).await
}
