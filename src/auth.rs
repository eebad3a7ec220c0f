use crate::IngestError;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

/// Claims this service requires of a bearer token. Anything beyond `sub`
/// and the registered expiry claim is ignored.
#[derive(Debug, Deserialize)]
struct IngestClaims {
    sub: String,
}

/// Verifies the bearer token presented with an ingestion request and
/// identifies the caller. Authentication is a precondition for everything
/// else in the pipeline, so it is checked before parsing or reservation.
pub trait Authenticator: Send + Sync {
    /// Returns the authenticated subject on success.
    fn authenticate(&self, authorization_header: Option<&str>) -> Result<String, IngestError>;
}

/// Verifies `HS256`-signed JWTs against a single shared secret, matching
/// the minimal auth surface called for by the external interfaces.
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
}

impl JwtAuthenticator {
    pub fn new(verification_key: &str) -> JwtAuthenticator {
        JwtAuthenticator {
            decoding_key: DecodingKey::from_secret(verification_key.as_bytes()),
        }
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, authorization_header: Option<&str>) -> Result<String, IngestError> {
        let header = authorization_header.ok_or(IngestError::Unauthorized)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(IngestError::Unauthorized)?;

        let data = decode::<IngestClaims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| IngestError::Unauthorized)?;

        Ok(data.claims.sub)
    }
}
