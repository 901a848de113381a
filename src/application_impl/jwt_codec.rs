use crate::application_port::{AccessTokenClaims, TokenCodec, TokenError};
use crate::domain_model::{RecordId, UserId};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The only algorithm this codec signs with or accepts.
const ALGORITHM: Algorithm = Algorithm::HS256;
const ALGORITHM_NAME: &str = "HS256";

#[derive(Clone)]
pub struct JwtConfig {
    pub signing_key: Vec<u8>,
    pub access_ttl: Duration,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("signing_key", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    sid: String,
    iat: i64,
    exp: i64,
}

pub struct JwtHs256Codec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        // expiry is checked by hand: strictly greater than now, no skew
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims =
            HashSet::from(["exp".to_string(), "sub".to_string()]);

        JwtHs256Codec {
            encoding_key: EncodingKey::from_secret(&cfg.signing_key),
            decoding_key: DecodingKey::from_secret(&cfg.signing_key),
            validation,
            access_ttl: cfg.access_ttl,
        }
    }
}

/// Check all three segments are well formed and read `alg` from the header,
/// without trusting anything else in the token.
fn declared_algorithm(token: &str) -> Result<String, TokenError> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed);
    };

    let header = json_segment(header)?;
    if !json_segment(payload)?.is_object() {
        return Err(TokenError::Malformed);
    }
    URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| TokenError::Malformed)?;

    header
        .get("alg")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .ok_or(TokenError::Malformed)
}

fn json_segment(segment: &str) -> Result<serde_json::Value, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(secs, 0).ok_or(TokenError::Malformed)
}

impl TokenCodec for JwtHs256Codec {
    fn encode(
        &self,
        subject: UserId,
        email: &str,
        session_id: RecordId,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let iat_dt = Utc::now();
        let exp_dt = iat_dt + ttl;
        let claims = Claims {
            sub: subject.to_string(),
            email: email.to_owned(),
            sid: session_id.to_string(),
            iat: iat_dt.timestamp(),
            exp: exp_dt.timestamp(),
        };
        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    fn decode(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        if declared_algorithm(token)? != ALGORITHM_NAME {
            return Err(TokenError::AlgorithmRejected);
        }

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                ErrorKind::InvalidAlgorithm => TokenError::AlgorithmRejected,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;
        let claims = data.claims;

        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(AccessTokenClaims {
            subject: claims.sub.parse().map_err(|_| TokenError::Malformed)?,
            email: claims.email,
            session_id: claims.sid.parse().map_err(|_| TokenError::Malformed)?,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
        })
    }

    fn access_ttl(&self) -> Duration {
        self.access_ttl
    }
}
