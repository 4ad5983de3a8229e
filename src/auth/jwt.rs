use std::time::Duration;

use anyhow::Context;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use super::session::session_token_from_headers;
use crate::{config::JwtConfig, error::AppError, state::AppState};

/// Session JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,   // user ID
    pub iat: usize,  // issued at (unix timestamp)
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: cfg.ttl(),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn sign(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = TimeDuration::try_from(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .context("session expiry is out of range")?;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

/// Caller identity taken from the session cookie, or from a bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);

        let token = session_token_from_headers(&parts.headers)
            .or_else(|| {
                parts
                    .headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))
                    .map(str::to_string)
            })
            .ok_or_else(|| AppError::unauthorized("Not authenticated"))?;

        let claims = keys.verify(&token).map_err(|_| {
            warn!("invalid or expired session token");
            AppError::unauthorized("Invalid or expired session")
        })?;

        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_TTL_MINUTES;
    use axum::http::{HeaderValue, Request};

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
        })
    }

    #[test]
    fn sign_and_verify() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id).expect("sign");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp - claims.iat, 5 * 60);
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys("same-secret", "good-iss", "good-aud");
        let bad_keys = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good_keys.sign(Uuid::new_v4()).expect("sign");
        assert!(bad_keys.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_foreign_secret() {
        let a = make_keys("secret-a", "iss", "aud");
        let b = make_keys("secret-b", "iss", "aud");
        let token = a.sign(Uuid::new_v4()).unwrap();
        assert!(b.verify(&token).is_err());
    }

    #[test]
    fn oversized_ttl_is_capped_instead_of_overflowing() {
        let keys = JwtKeys::from(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: i64::MAX,
        });
        assert_eq!(keys.ttl, Duration::from_secs(MAX_TTL_MINUTES as u64 * 60));

        let claims = keys.verify(&keys.sign(Uuid::new_v4()).unwrap()).unwrap();
        assert_eq!(claims.exp - claims.iat, MAX_TTL_MINUTES as usize * 60);
    }

    #[test]
    fn non_positive_ttl_still_yields_a_usable_token() {
        for ttl_minutes in [0, -5, i64::MIN] {
            let keys = JwtKeys::from(&JwtConfig {
                secret: "dev-secret".into(),
                issuer: "iss".into(),
                audience: "aud".into(),
                ttl_minutes,
            });
            assert_eq!(keys.ttl, Duration::from_secs(60));
            assert!(keys.verify(&keys.sign(Uuid::new_v4()).unwrap()).is_ok());
        }
    }

    async fn extract(req: Request<()>) -> Result<AuthUser, AppError> {
        let state = AppState::fake();
        let (mut parts, _) = req.into_parts();
        AuthUser::from_request_parts(&mut parts, &state).await
    }

    #[tokio::test]
    async fn extractor_reads_session_cookie() {
        let keys = JwtKeys::from_ref(&AppState::fake());
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id).unwrap();

        let mut req = Request::new(());
        req.headers_mut().insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; token={token}")).unwrap(),
        );
        let AuthUser(id) = extract(req).await.expect("cookie accepted");
        assert_eq!(id, user_id);
    }

    #[tokio::test]
    async fn extractor_falls_back_to_bearer() {
        let keys = JwtKeys::from_ref(&AppState::fake());
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id).unwrap();

        let mut req = Request::new(());
        req.headers_mut().insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        let AuthUser(id) = extract(req).await.expect("bearer accepted");
        assert_eq!(id, user_id);
    }

    #[tokio::test]
    async fn extractor_rejects_missing_and_cleared_cookie() {
        let err = extract(Request::new(())).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let mut req = Request::new(());
        req.headers_mut()
            .insert(header::COOKIE, HeaderValue::from_static("token="));
        let err = extract(req).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn extractor_rejects_garbage_token() {
        let mut req = Request::new(());
        req.headers_mut()
            .insert(header::COOKIE, HeaderValue::from_static("token=not.a.jwt"));
        let err = extract(req).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired session");
    }
}
