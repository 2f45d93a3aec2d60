use crate::{
    api::handlers::{health, root},
    otp::{
        OtpService,
        bypass::{BypassPolicy, DisabledBypass, MasterCodeBypass},
        notifier::{LogNotifier, Notifier, SmtpNotifier},
        rate_limit::{self, RateLimiter, SlidingWindowLimiter},
        repo::{IdentityStore, MemoryIdentityStore, PgIdentityStore},
        clock::{Clock, SystemClock},
    },
    session::SessionIssuer,
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, options},
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span, warn};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use handlers::auth::{AuthConfig, AuthState};
pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Outbound mail settings. Without an SMTP URL codes are only logged (masked).
#[derive(Debug)]
pub struct EmailConfig {
    smtp_url: Option<SecretString>,
    from: String,
}

impl EmailConfig {
    #[must_use]
    pub fn new(from: String) -> Self {
        Self {
            smtp_url: None,
            from,
        }
    }

    #[must_use]
    pub fn with_smtp_url(mut self, smtp_url: Option<SecretString>) -> Self {
        self.smtp_url = smtp_url;
        self
    }

    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }
}

/// Secrets handed to the server at startup.
pub struct Secrets {
    pub session_secret: SecretString,
    pub bypass_code: Option<SecretString>,
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: Option<String>,
    auth_config: AuthConfig,
    email_config: EmailConfig,
    secrets: Secrets,
) -> Result<()> {
    let store = connect_store(dsn.as_deref()).await?;
    let notifier = build_notifier(&email_config, &auth_config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let limiter = Arc::new(
        SlidingWindowLimiter::new(clock.clone())
            .with_window(auth_config.rate_limit_window())
            .with_max_requests(auth_config.rate_limit_max()),
    );
    // Idle windows are dropped once per window so memory tracks recently active emails only.
    let _sweeper = rate_limit::spawn_sweeper(limiter.clone(), limiter.window());

    let otp = build_otp_service(&auth_config, store, notifier, clock, secrets);
    let rate_limiter: Arc<dyn RateLimiter> = limiter;
    let auth_state = Arc::new(AuthState::new(auth_config, Arc::new(otp), rate_limiter));

    let app = app(auth_state)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Assemble the full HTTP application around an [`AuthState`].
///
/// # Errors
/// Returns an error if the configured frontend URL cannot be turned into a CORS origin.
pub fn app(auth_state: Arc<AuthState>) -> Result<Router> {
    let frontend_origin = frontend_origin(auth_state.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let (router, openapi) = router().split_for_parts();
    let app = router
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state)),
        );

    Ok(app)
}

async fn connect_store(dsn: Option<&str>) -> Result<Arc<dyn IdentityStore>> {
    let Some(dsn) = dsn else {
        warn!("No DSN configured; identities are kept in memory and lost on restart");
        return Ok(Arc::new(MemoryIdentityStore::new()));
    };

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    Ok(Arc::new(PgIdentityStore::new(pool)))
}

fn build_notifier(email_config: &EmailConfig, auth_config: &AuthConfig) -> Result<Arc<dyn Notifier>> {
    match &email_config.smtp_url {
        Some(smtp_url) => {
            let ttl_minutes = auth_config.otp_ttl().as_secs().div_ceil(60);
            let notifier =
                SmtpNotifier::new(smtp_url.expose_secret(), email_config.from(), ttl_minutes)?;
            info!("SMTP delivery enabled");
            Ok(Arc::new(notifier))
        }
        None => {
            warn!("No SMTP URL configured; one-time codes are logged, not mailed");
            Ok(Arc::new(LogNotifier))
        }
    }
}

fn build_otp_service(
    auth_config: &AuthConfig,
    store: Arc<dyn IdentityStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    secrets: Secrets,
) -> OtpService {
    let sessions = SessionIssuer::new(secrets.session_secret)
        .with_ttl(auth_config.session_ttl())
        .with_issuer(auth_config.session_issuer().to_string());

    let bypass: Arc<dyn BypassPolicy> = match secrets.bypass_code {
        Some(code) => {
            warn!("OTP bypass code enabled; do not use this in production");
            Arc::new(MasterCodeBypass::new(code))
        }
        None => Arc::new(DisabledBypass),
    };

    OtpService::new(store, notifier, Arc::new(sessions))
        .with_clock(clock)
        .with_bypass(bypass)
        .with_code_ttl(auth_config.otp_ttl())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_path() {
        let origin = frontend_origin("https://polls.example.com:8443/app/");
        assert_eq!(
            origin.ok().as_ref().and_then(|value| value.to_str().ok()),
            Some("https://polls.example.com:8443")
        );
    }

    #[test]
    fn frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
        assert!(frontend_origin("mailto:someone@example.com").is_err());
    }

    #[test]
    fn notifier_defaults_to_log_without_smtp() {
        let config = AuthConfig::new("http://localhost:5173".to_string());
        let email = EmailConfig::new("Ballot <no-reply@ballot.dev>".to_string());
        assert!(build_notifier(&email, &config).is_ok());

        let broken = email.with_smtp_url(Some(SecretString::from("smtp://localhost:2525")));
        let broken = EmailConfig {
            from: "not an address".to_string(),
            ..broken
        };
        assert!(build_notifier(&broken, &config).is_err());
    }

    #[tokio::test]
    async fn memory_store_without_dsn() -> Result<()> {
        let store = connect_store(None).await?;
        assert_eq!(store.kind(), "memory");
        Ok(())
    }
}
