//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action the binary executes, currently
//! only starting the API server with its full configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, email};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .filter(|dsn| !dsn.trim().is_empty())
        .cloned();

    let auth_opts = auth::Options::parse(matches)?;
    let email_opts = email::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        frontend_base_url: auth_opts.frontend_base_url,
        session_secret: auth_opts.session_secret,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        session_issuer: auth_opts.session_issuer,
        otp_ttl_seconds: auth_opts.otp_ttl_seconds,
        otp_rate_limit_window_seconds: auth_opts.otp_rate_limit_window_seconds,
        otp_rate_limit_max: auth_opts.otp_rate_limit_max,
        otp_bypass_code: auth_opts.otp_bypass_code,
        smtp_url: email_opts.smtp_url,
        smtp_from: email_opts.smtp_from,
    }))
}
