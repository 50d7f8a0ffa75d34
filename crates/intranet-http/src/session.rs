use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use intranet_chat::AuthSession;
use intranet_types::api::Claims;

/// Session backed by an access token issued by the auth service.
///
/// The claims are read without verifying the signature: the server verifies
/// every request, the client only needs the user id and expiry.
#[derive(Debug, Clone)]
pub struct TokenSession {
    token: String,
    claims: Claims,
}

impl TokenSession {
    pub fn from_token(token: impl Into<String>) -> Result<Self, jsonwebtoken::errors::Error> {
        let token = token.into();
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        let data = decode::<Claims>(&token, &DecodingKey::from_secret(&[]), &validation)?;
        Ok(Self {
            token,
            claims: data.claims,
        })
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn username(&self) -> &str {
        &self.claims.username
    }

    pub fn is_expired(&self) -> bool {
        i64::try_from(self.claims.exp).is_ok_and(|exp| exp <= Utc::now().timestamp())
    }
}

impl AuthSession for TokenSession {
    fn user_id(&self) -> Option<Uuid> {
        Some(self.claims.sub)
    }

    fn access_token(&self) -> Option<String> {
        (!self.is_expired()).then(|| self.token.clone())
    }
}
