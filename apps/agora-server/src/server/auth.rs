use agora_core::{UserId, UserStatus};
use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use pasetors::{
    claims::{Claims, ClaimsValidationRules},
    local,
    token::UntrustedToken,
    version4::V4,
    Local,
};
use rand::rngs::OsRng;

use super::{
    core::{AppState, AuthContext},
    errors::AuthFailure,
    store::Filter,
};

pub(crate) fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hash failed: {e}"))?
        .to_string();
    Ok(hash)
}

pub(crate) fn verify_password(stored_hash: &str, supplied_password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(supplied_password.as_bytes(), &parsed)
        .is_ok()
}

pub(crate) fn issue_access_token(state: &AppState, user_id: UserId) -> anyhow::Result<String> {
    let mut claims = Claims::new_expires_in(&state.runtime.access_token_ttl)
        .map_err(|e| anyhow!("claims init failed: {e}"))?;
    claims
        .subject(&user_id.to_string())
        .map_err(|e| anyhow!("claim sub failed: {e}"))?;
    local::encrypt(&state.token_key, &claims, None, None)
        .map_err(|e| anyhow!("access token mint failed: {e}"))
}

pub(crate) fn verify_access_token(state: &AppState, token: &str) -> anyhow::Result<Claims> {
    let untrusted = UntrustedToken::<Local, V4>::try_from(token).map_err(|e| anyhow!("{e}"))?;
    let validation_rules = ClaimsValidationRules::new();
    let trusted = local::decrypt(&state.token_key, &untrusted, &validation_rules, None, None)
        .map_err(|e| anyhow!("token decrypt failed: {e}"))?;
    trusted
        .payload_claims()
        .cloned()
        .ok_or_else(|| anyhow!("token claims missing"))
}

/// Resolves the bearer token into the caller identity. The subject must
/// still name an existing, active user.
pub(crate) async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthContext, AuthFailure> {
    let access_token = bearer_token(headers).ok_or(AuthFailure::Unauthorized)?;
    let claims = verify_access_token(state, access_token).map_err(|_| AuthFailure::Unauthorized)?;
    let subject = claims
        .get_claim("sub")
        .and_then(serde_json::Value::as_str)
        .ok_or(AuthFailure::Unauthorized)?;
    let user_id = UserId::try_from(subject.to_owned()).map_err(|_| AuthFailure::Unauthorized)?;
    let known = state
        .store
        .users
        .exists(&(Filter::by_id(user_id) & Filter::eq("status", UserStatus::Active)))
        .await
        .map_err(|error| {
            tracing::error!(event = "auth.authenticate", error = %error);
            AuthFailure::Internal
        })?;
    if !known {
        return Err(AuthFailure::Unauthorized);
    }
    Ok(AuthContext { user_id })
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    header.strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use agora_core::{UserId, UserStatus};
    use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};

    use super::{
        authenticate, bearer_token, hash_password, issue_access_token, verify_access_token,
        verify_password,
    };
    use crate::server::{
        core::{AppConfig, AppState},
        domain::{test_support::seed_user, update_with_retry},
        errors::AuthFailure,
        records::UserRecord,
        store::Filter,
    };

    #[test]
    fn password_hashes_verify_only_the_original() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password(&hash, "correct horse"));
        assert!(!verify_password(&hash, "battery staple"));
        assert!(!verify_password("not-a-hash", "correct horse"));
    }

    #[test]
    fn access_tokens_carry_the_subject() {
        let state = AppState::new(&AppConfig::default()).unwrap();
        let user_id = UserId::new();
        let token = issue_access_token(&state, user_id).unwrap();
        let claims = verify_access_token(&state, &token).unwrap();
        assert_eq!(
            claims.get_claim("sub").and_then(serde_json::Value::as_str),
            Some(user_id.to_string().as_str())
        );

        let other = AppState::new(&AppConfig::default()).unwrap();
        assert!(verify_access_token(&other, &token).is_err());
    }

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
    }

    #[tokio::test]
    async fn inactive_users_lose_access_with_live_tokens() {
        let state = AppState::new(&AppConfig::default()).unwrap();
        let user_id = seed_user(&state, "soon_banned").await;
        let token = issue_access_token(&state, user_id).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert_eq!(authenticate(&state, &headers).await.unwrap().user_id, user_id);

        update_with_retry(
            &state.store.users,
            &Filter::by_id(user_id),
            "User not found",
            |user: &mut UserRecord| {
                user.status = UserStatus::Banned;
                Ok(())
            },
        )
        .await
        .unwrap();
        assert!(matches!(
            authenticate(&state, &headers).await,
            Err(AuthFailure::Unauthorized)
        ));
    }
}
