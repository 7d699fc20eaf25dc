use crate::error::{SyncError, SyncResult};
use ::agora_protocol::model::ids::UserId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub moderator: bool,
}

impl Identity {
    pub fn user(user_id: impl Into<String>) -> Identity {
        Identity {
            user_id: UserId::new(user_id),
            moderator: false,
        }
    }

    pub fn moderator(user_id: impl Into<String>) -> Identity {
        Identity {
            user_id: UserId::new(user_id),
            moderator: true,
        }
    }
}

pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> SyncResult<Identity>;
}

#[derive(::serde::Serialize, ::serde::Deserialize)]
struct TokenClaims {
    sub: String,
    #[serde(default)]
    moderator: bool,
    /// Unix milliseconds.
    exp: i64,
}

/// Bearer tokens of the form `base64url(claims).base64url(hmac)` where the
/// HMAC-SHA256 covers the encoded claims.
pub struct HmacTokenVerifier {
    key: Vec<u8>,
}

fn encode(bytes: impl AsRef<[u8]>) -> String {
    ::base64::encode_config(bytes, ::base64::URL_SAFE_NO_PAD)
}

impl HmacTokenVerifier {
    pub fn new(key: &[u8]) -> Self {
        Self { key: key.to_vec() }
    }

    pub fn sign(
        &self,
        identity: &Identity,
        ttl: ::chrono::Duration,
    ) -> ::anyhow::Result<String> {
        let claims = TokenClaims {
            sub: identity.user_id.to_string(),
            moderator: identity.moderator,
            exp: (::chrono::Utc::now() + ttl).timestamp_millis(),
        };

        let body = encode(::serde_json::to_vec(&claims)?);
        let mac = ::hmac_sha256::HMAC::mac(body.as_bytes(), &self.key);

        Ok(format!("{}.{}", body, encode(mac)))
    }
}

impl IdentityVerifier for HmacTokenVerifier {
    fn verify(&self, token: &str) -> SyncResult<Identity> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();

        let (body, mac) = token
            .split_once('.')
            .ok_or_else(|| SyncError::auth("malformed token"))?;

        let mac = ::base64::decode_config(mac, ::base64::URL_SAFE_NO_PAD)
            .map_err(|_| SyncError::auth("malformed token"))?;

        let expected = ::hmac_sha256::HMAC::mac(body.as_bytes(), &self.key);

        if !::constant_time_eq::constant_time_eq(&expected, &mac) {
            return Err(SyncError::auth("invalid token signature"));
        }

        let claims: TokenClaims = ::base64::decode_config(
            body,
            ::base64::URL_SAFE_NO_PAD,
        )
        .ok()
        .and_then(|x| ::serde_json::from_slice(&x).ok())
        .ok_or_else(|| SyncError::auth("malformed token"))?;

        if claims.exp <= ::chrono::Utc::now().timestamp_millis() {
            return Err(SyncError::auth("token expired"));
        }

        if claims.sub.is_empty() {
            return Err(SyncError::auth("token without subject"));
        }

        Ok(Identity {
            user_id: UserId::new(claims.sub),
            moderator: claims.moderator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_verifier() -> HmacTokenVerifier {
        HmacTokenVerifier::new(b"token-key")
    }

    #[test]
    fn verify_signed_token() {
        let verifier = make_verifier();
        let token = verifier
            .sign(&Identity::moderator("u1"), ::chrono::Duration::minutes(5))
            .unwrap();

        assert_eq!(verifier.verify(&token).unwrap(), Identity::moderator("u1"));
        assert_eq!(
            verifier.verify(&format!("Bearer {}", token)).unwrap(),
            Identity::moderator("u1")
        );
    }

    #[test]
    fn verify_fails_if_signed_with_other_key() {
        let token = HmacTokenVerifier::new(b"other")
            .sign(&Identity::user("u1"), ::chrono::Duration::minutes(5))
            .unwrap();

        assert!(matches!(
            make_verifier().verify(&token),
            Err(SyncError::Auth(_))
        ));
    }

    #[test]
    fn verify_fails_if_claims_mutated() {
        let verifier = make_verifier();
        let token = verifier
            .sign(&Identity::user("u1"), ::chrono::Duration::minutes(5))
            .unwrap();
        let (_, mac) = token.split_once('.').unwrap();

        let forged_claims = encode(
            ::serde_json::to_vec(&TokenClaims {
                sub: "u1".to_string(),
                moderator: true,
                exp: i64::MAX,
            })
            .unwrap(),
        );

        assert!(verifier
            .verify(&format!("{}.{}", forged_claims, mac))
            .is_err());
    }

    #[test]
    fn verify_fails_if_expired_or_malformed() {
        let verifier = make_verifier();
        let token = verifier
            .sign(&Identity::user("u1"), ::chrono::Duration::minutes(-1))
            .unwrap();

        assert!(verifier.verify(&token).is_err());
        assert!(verifier.verify("").is_err());
        assert!(verifier.verify("abc").is_err());
        assert!(verifier.verify("abc.!!!").is_err());
    }
}
