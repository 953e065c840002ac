use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::{
    claims::{Claims, TokenKind, UserClaims},
    dto::TokenPair,
};
use crate::{accounts::User, config::JwtConfig, state::AppState};

/// Signing/verification keys and token lifetimes.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_ttl: Duration::from_secs((config.ttl_minutes.max(0) as u64) * 60),
            refresh_ttl: Duration::from_secs((config.refresh_ttl_minutes.max(0) as u64) * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn claims(&self, kind: TokenKind, user: UserClaims) -> Claims {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl(kind).as_secs() as i64);
        Claims {
            token_type: kind,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            jti: Uuid::new_v4(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            user,
        }
    }

    pub fn refresh_claims(&self, user: &User) -> Claims {
        self.claims(TokenKind::Refresh, UserClaims::from(user))
    }

    /// Access claims derived from a refresh token: same identity, fresh
    /// `jti`/`iat`, access lifetime.
    pub fn access_claims(&self, refresh: &Claims) -> Claims {
        self.claims(TokenKind::Access, refresh.user.clone())
    }

    pub fn sign(&self, claims: &Claims) -> anyhow::Result<String> {
        let token = encode(&Header::default(), claims, &self.encoding)?;
        debug!(user_id = %claims.user.user_id, kind = ?claims.token_type, "jwt signed");
        Ok(token)
    }

    /// Refresh token for the user plus the access token derived from it.
    pub fn issue_pair(&self, user: &User) -> anyhow::Result<TokenPair> {
        let refresh = self.refresh_claims(user);
        let access = self.access_claims(&refresh);
        Ok(TokenPair {
            access: self.sign(&access)?,
            refresh: self.sign(&refresh)?,
        })
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.user.user_id, kind = ?data.claims.token_type, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.token_type != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }

    /// New access token from a valid refresh token.
    pub fn refresh_access(&self, refresh_token: &str) -> anyhow::Result<String> {
        let refresh = self.verify_refresh(refresh_token)?;
        self.sign(&self.access_claims(&refresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::NewUser;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    fn make_user() -> User {
        let mut user = User::new(NewUser {
            name: Some("Ada Lovelace".into()),
            email: Some("a@x.com".into()),
            phone_number: Some("+15550100".into()),
            ..NewUser::default()
        })
        .expect("user");
        user.role_id = Some(Uuid::new_v4());
        user
    }

    #[test]
    fn refresh_token_carries_user_claims() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user = make_user();
        let pair = keys.issue_pair(&user).expect("issue pair");
        let claims = keys.verify_refresh(&pair.refresh).expect("verify refresh");
        assert_eq!(claims.user, UserClaims::from(&user));
        assert_eq!(claims.user.role, user.role_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[test]
    fn access_token_is_derived_and_shorter_lived() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let pair = keys.issue_pair(&make_user()).expect("issue pair");
        let access = keys.verify(&pair.access).expect("verify access");
        let refresh = keys.verify(&pair.refresh).expect("verify refresh");
        assert_eq!(access.token_type, TokenKind::Access);
        assert_eq!(access.user, refresh.user);
        assert_ne!(access.jti, refresh.jti);
        assert!(access.exp < refresh.exp);
    }

    #[test]
    fn missing_role_is_null_in_payload() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let mut user = make_user();
        user.role_id = None;
        let json = serde_json::to_value(keys.refresh_claims(&user)).expect("json");
        assert!(json["role"].is_null());
        assert_eq!(json["email"], "a@x.com");
        assert_eq!(json["token_type"], "refresh");
    }

    #[test]
    fn verify_refresh_rejects_access_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let pair = keys.issue_pair(&make_user()).expect("issue pair");
        let err = keys.verify_refresh(&pair.access).unwrap_err();
        assert!(err.to_string().contains("not a refresh token"));
        assert!(keys.refresh_access(&pair.access).is_err());
    }

    #[test]
    fn refresh_access_mints_new_access_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let user = make_user();
        let pair = keys.issue_pair(&user).expect("issue pair");
        let access = keys.refresh_access(&pair.refresh).expect("refresh");
        let claims = keys.verify(&access).expect("verify");
        assert_eq!(claims.token_type, TokenKind::Access);
        assert_eq!(claims.user.user_id, user.id);
    }

    #[test]
    fn verify_rejects_foreign_secret_issuer_or_audience() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let pair = good.issue_pair(&make_user()).expect("issue pair");
        assert!(make_keys("same-secret", "bad-iss", "good-aud").verify(&pair.access).is_err());
        assert!(make_keys("same-secret", "good-iss", "bad-aud").verify(&pair.access).is_err());
        assert!(make_keys("other-secret", "good-iss", "good-aud").verify(&pair.access).is_err());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let mut claims = keys.refresh_claims(&make_user());
        let past = (OffsetDateTime::now_utc() - TimeDuration::hours(1)).unix_timestamp() as usize;
        claims.iat = past;
        claims.exp = past;
        let token = keys.sign(&claims).expect("sign");
        assert!(keys.verify(&token).is_err());
    }
}
