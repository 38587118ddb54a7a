use crate::errors::ProviderError;
use crate::traits::PrincipalProvider;
use crate::types::{Entity, EntityRef};
use http::HeaderMap;
use http::header::AUTHORIZATION;
use http::request::Parts;
use std::fmt;
use std::sync::Arc;

/// Entity type of principals built from a bearer token.
pub const TOKEN_PRINCIPAL_TYPE: &str = "Principal";

/// Use the bearer token itself as an opaque principal id.
///
/// # Errors
/// Fails when the `Authorization` header is missing, repeated, or not a
/// non-empty bearer token.
pub fn bearer_principal(headers: &HeaderMap) -> Result<Entity, ProviderError> {
    let mut values = headers.get_all(AUTHORIZATION).iter();
    let value = values.next().ok_or(ProviderError::MissingAuthorization)?;
    if values.next().is_some() {
        return Err(ProviderError::MultipleAuthorization);
    }

    let value = value.to_str().map_err(|_| ProviderError::NotBearer)?;
    let is_bearer = value
        .get(..6)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("bearer"));
    if !is_bearer {
        return Err(ProviderError::NotBearer);
    }

    let token = value
        .split(' ')
        .nth(1)
        .filter(|token| !token.is_empty())
        .ok_or(ProviderError::NotBearer)?;

    Ok(Entity::new(EntityRef::new(TOKEN_PRINCIPAL_TYPE, token)))
}

/// How the caller's principal entity is derived.
#[derive(Clone)]
pub enum PrincipalMapping {
    /// Bearer access token as an opaque id.
    AccessToken,
    /// Bearer identity token as an opaque id.
    IdentityToken,
    Custom(Arc<dyn PrincipalProvider>),
}

impl fmt::Debug for PrincipalMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessToken => f.write_str("AccessToken"),
            Self::IdentityToken => f.write_str("IdentityToken"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl PrincipalMapping {
    /// Custom principals carry attributes and are sent to the engine as entities.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    /// # Errors
    /// Returns [`ProviderError`] if no usable caller identity is present.
    pub async fn resolve(&self, parts: &Parts) -> Result<Entity, ProviderError> {
        match self {
            Self::AccessToken | Self::IdentityToken => bearer_principal(&parts.headers),
            Self::Custom(provider) => provider.principal(parts).await,
        }
    }
}
