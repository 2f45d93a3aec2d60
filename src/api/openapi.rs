use super::handlers::{auth, health};
use utoipa::openapi::{Contact, Info, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Routes registered here via `.routes(routes!(...))` are both served and
/// documented. `/` and `OPTIONS /health` are added outside and stay undocumented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service and identity store status".to_string());

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("One-time code login and session profile".to_string());

    let mut document = OpenApiBuilder::new().info(package_info()).build();
    document.tags = Some(vec![health_tag, auth_tag]);

    OpenApiRouter::with_openapi(document)
        .routes(routes!(health::health))
        .routes(routes!(auth::otp::send_otp))
        .routes(routes!(auth::otp::verify_otp))
        .routes(routes!(auth::otp::resend_otp))
        .routes(routes!(auth::profile::me))
        .routes(routes!(auth::profile::update_profile))
}

/// `OpenAPI` info block from the package manifest.
fn package_info() -> Info {
    let mut info = Info::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info.description = manifest_field(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    info.contact = maintainer(env!("CARGO_PKG_AUTHORS"));
    info.license = manifest_field(env!("CARGO_PKG_LICENSE")).map(|spdx| {
        let mut license = License::new(spdx);
        license.identifier = Some(spdx.to_string());
        license
    });
    info
}

fn manifest_field(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// First listed author as the API contact, as `Name <email>` or either part alone.
fn maintainer(authors: &str) -> Option<Contact> {
    let author = manifest_field(authors.split(';').next()?)?;
    let (name, email) = match author.split_once('<') {
        Some((name, email)) => (
            manifest_field(name),
            manifest_field(email.trim_end_matches('>')),
        ),
        None => (Some(author), None),
    };
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}
