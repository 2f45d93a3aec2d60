use anyhow::{Context, Result, bail};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_ISSUER: &str = "session-issuer";
pub const ARG_OTP_TTL_SECONDS: &str = "otp-ttl-seconds";
pub const ARG_OTP_RATE_LIMIT_WINDOW_SECONDS: &str = "otp-rate-limit-window-seconds";
pub const ARG_OTP_RATE_LIMIT_MAX: &str = "otp-rate-limit-max";
pub const ARG_OTP_BYPASS_CODE: &str = "otp-bypass-code";

pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    with_otp_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL, used as the allowed CORS origin")
                .env("BALLOT_FRONTEND_BASE_URL")
                .default_value("http://localhost:5173"),
        )
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("HMAC secret used to sign session tokens")
                .env("BALLOT_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session token TTL in seconds")
                .env("BALLOT_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_ISSUER)
                .long(ARG_SESSION_ISSUER)
                .help("Issuer claim placed in session tokens")
                .env("BALLOT_SESSION_ISSUER")
                .default_value(crate::session::DEFAULT_ISSUER),
        )
}

fn with_otp_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OTP_TTL_SECONDS)
                .long(ARG_OTP_TTL_SECONDS)
                .help("One-time code TTL in seconds")
                .env("BALLOT_OTP_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_OTP_RATE_LIMIT_WINDOW_SECONDS)
                .long(ARG_OTP_RATE_LIMIT_WINDOW_SECONDS)
                .help("Sliding window for code requests per email, in seconds")
                .env("BALLOT_OTP_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_OTP_RATE_LIMIT_MAX)
                .long(ARG_OTP_RATE_LIMIT_MAX)
                .help("Maximum code requests per email within the window")
                .env("BALLOT_OTP_RATE_LIMIT_MAX")
                .default_value("3")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_OTP_BYPASS_CODE)
                .long(ARG_OTP_BYPASS_CODE)
                .help("Master 6-digit code accepted for any email (development only)")
                .env("BALLOT_OTP_BYPASS_CODE")
                .hide_env_values(true),
        )
}

pub struct Options {
    pub frontend_base_url: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: u64,
    pub session_issuer: String,
    pub otp_ttl_seconds: u64,
    pub otp_rate_limit_window_seconds: u64,
    pub otp_rate_limit_max: usize,
    pub otp_bypass_code: Option<SecretString>,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
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
            .finish()
    }
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing, or if the bypass
    /// code could never match a submitted code.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let session_secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .filter(|secret| !secret.trim().is_empty())
            .map(|secret| SecretString::from(secret.clone()))
            .context("missing required argument: --session-secret")?;

        let otp_bypass_code = match matches
            .get_one::<String>(ARG_OTP_BYPASS_CODE)
            .filter(|code| !code.is_empty())
        {
            Some(code) if !crate::otp::crypto::is_well_formed(code) => {
                bail!("invalid --otp-bypass-code: expected exactly 6 digits")
            }
            code => code.map(|code| SecretString::from(code.clone())),
        };

        Ok(Self {
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .context("missing required argument: --frontend-base-url")?,
            session_secret,
            session_ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(604_800),
            session_issuer: matches
                .get_one::<String>(ARG_SESSION_ISSUER)
                .cloned()
                .unwrap_or_else(|| crate::session::DEFAULT_ISSUER.to_string()),
            otp_ttl_seconds: matches
                .get_one::<u64>(ARG_OTP_TTL_SECONDS)
                .copied()
                .unwrap_or(600),
            otp_rate_limit_window_seconds: matches
                .get_one::<u64>(ARG_OTP_RATE_LIMIT_WINDOW_SECONDS)
                .copied()
                .unwrap_or(900),
            otp_rate_limit_max: matches
                .get_one::<usize>(ARG_OTP_RATE_LIMIT_MAX)
                .copied()
                .unwrap_or(3),
            otp_bypass_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn parse_args(args: &[&str]) -> Result<Options> {
        temp_env::with_vars(
            [
                ("BALLOT_SESSION_SECRET", Some("secret")),
                ("BALLOT_OTP_BYPASS_CODE", None::<&str>),
            ],
            || {
                let matches = with_args(Command::new("ballot"))
                    .try_get_matches_from(std::iter::once("ballot").chain(args.iter().copied()))?;
                Options::parse(&matches)
            },
        )
    }

    #[test]
    fn bypass_code_must_be_six_digits() {
        for code in ["12345", "1234567", "abcdef", "12 456"] {
            let err = parse_args(&["--otp-bypass-code", code]).err();
            assert_eq!(
                err.map(|err| err.to_string()),
                Some("invalid --otp-bypass-code: expected exactly 6 digits".to_string()),
                "{code}"
            );
        }
    }

    #[test]
    fn bypass_code_accepted_or_unset() -> Result<()> {
        let options = parse_args(&["--otp-bypass-code", "000000"])?;
        assert_eq!(
            options
                .otp_bypass_code
                .as_ref()
                .map(|code| code.expose_secret().to_string()),
            Some("000000".to_string())
        );

        assert!(parse_args(&[])?.otp_bypass_code.is_none());
        assert!(parse_args(&["--otp-bypass-code", ""])?.otp_bypass_code.is_none());
        Ok(())
    }
}
