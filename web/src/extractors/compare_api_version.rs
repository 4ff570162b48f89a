//! Extractor that enforces the `x-version` API version header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use log::*;
use semver::Version;
use service::config::ApiVersion;

/// Rejects requests whose `x-version` header is missing, malformed, or not
/// one of the versions this build of the API exposes.
pub struct CompareApiVersion(pub Version);

impl<S> FromRequestParts<S> for CompareApiVersion
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let field_name = ApiVersion::field_name();

        let header = parts.headers.get(field_name).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("Missing required {field_name} header"),
            )
        })?;

        let value = header.to_str().map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                format!("{field_name} header is not valid UTF-8"),
            )
        })?;

        let version = Version::parse(value).map_err(|err| {
            warn!("Failed to parse {field_name} header {value}: {err}");
            (
                StatusCode::BAD_REQUEST,
                format!("{field_name} header is not a valid semantic version"),
            )
        })?;

        if !ApiVersion::versions().contains(&value) {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unsupported API version: {value}"),
            ));
        }

        Ok(CompareApiVersion(version))
    }
}
