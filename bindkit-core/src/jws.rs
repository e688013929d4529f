//! Compact JWS assertions over the server challenge.
//!
//! A successful ceremony produces an `ES256` JWS whose header embeds the
//! bound key's public JWK and `kid`, and whose claims carry the subject,
//! the challenge verbatim and a short local expiry. ECDSA/P-256 signatures
//! here are deterministic (RFC 6979), so identical inputs produce identical
//! tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{EncodedPoint, FieldBytes};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::KeyPair;

const JWS_ALGORITHM: &str = "ES256";

/// Errors building or checking a signed assertion.
#[derive(Debug, Error)]
pub enum AssertionError {
    /// JSON encoding of the header or claims failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The token is not a structurally valid compact JWS.
    #[error("malformed token: {reason}")]
    Malformed {
        /// What made the token unreadable.
        reason: String,
    },
    /// The token names an algorithm this crate does not sign with.
    #[error("unsupported algorithm: {alg}")]
    UnsupportedAlgorithm {
        /// The algorithm found in the header.
        alg: String,
    },
    /// The signature does not verify under the embedded key.
    #[error("invalid signature")]
    InvalidSignature,
}

/// A signed assertion produced by a successful binding ceremony.
#[derive(Debug, Clone)]
pub struct SignedAssertion {
    /// The compact JWS.
    pub jws: String,
    /// Key identifier issued by the record store, embedded in the header.
    pub kid: String,
    /// Unix-seconds expiry embedded in the claims.
    pub expires_at: i64,
}

#[derive(Serialize, Deserialize)]
struct Jwk {
    kty: String,
    crv: String,
    x: String,
    y: String,
    #[serde(rename = "use")]
    key_use: String,
    alg: String,
    kid: String,
}

#[derive(Serialize, Deserialize)]
struct JwsHeader {
    alg: String,
    kid: String,
    jwk: Jwk,
}

#[derive(Serialize, Deserialize)]
struct AssertionClaims {
    sub: String,
    challenge: String,
    exp: i64,
}

/// Claims recovered from a verified assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAssertion {
    /// The `sub` claim: the bound user id.
    pub subject: String,
    /// The `challenge` claim, byte-for-byte as signed.
    pub challenge: String,
    /// The `exp` claim in unix seconds.
    pub expires_at: i64,
    /// The header `kid`.
    pub kid: String,
}

fn jwk_for(key_pair: &KeyPair, kid: &str) -> Result<Jwk, AssertionError> {
    let point = key_pair.public_key.to_encoded_point(false);
    let (Some(x), Some(y)) = (point.x(), point.y()) else {
        return Err(AssertionError::Malformed {
            reason: "public key has no affine coordinates".to_string(),
        });
    };
    Ok(Jwk {
        kty: "EC".to_string(),
        crv: "P-256".to_string(),
        x: URL_SAFE_NO_PAD.encode(x),
        y: URL_SAFE_NO_PAD.encode(y),
        key_use: "sig".to_string(),
        alg: JWS_ALGORITHM.to_string(),
        kid: kid.to_string(),
    })
}

/// Signs the server challenge into a compact JWS.
///
/// Claims are `{sub: user_id, challenge, exp: expires_at}`; the header
/// carries `kid` and the public JWK so the server can verify without a key
/// lookup.
pub(crate) fn sign_assertion(
    key_pair: &KeyPair,
    kid: &str,
    user_id: &str,
    challenge: &str,
    expires_at: i64,
) -> Result<String, AssertionError> {
    let header = JwsHeader {
        alg: JWS_ALGORITHM.to_string(),
        kid: kid.to_string(),
        jwk: jwk_for(key_pair, kid)?,
    };
    let claims = AssertionClaims {
        sub: user_id.to_string(),
        challenge: challenge.to_string(),
        exp: expires_at,
    };
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
    );
    let signature: Signature = key_pair
        .private_key
        .signing_key()
        .sign(signing_input.as_bytes());
    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>, AssertionError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AssertionError::Malformed {
            reason: format!("{what} is not valid base64url"),
        })
}

fn verifying_key_from_jwk(jwk: &Jwk) -> Result<VerifyingKey, AssertionError> {
    let x = decode_segment(&jwk.x, "jwk x coordinate")?;
    let y = decode_segment(&jwk.y, "jwk y coordinate")?;
    if x.len() != 32 || y.len() != 32 {
        return Err(AssertionError::Malformed {
            reason: "jwk coordinates must be 32 bytes".to_string(),
        });
    }
    let point = EncodedPoint::from_affine_coordinates(
        FieldBytes::from_slice(&x),
        FieldBytes::from_slice(&y),
        false,
    );
    VerifyingKey::from_encoded_point(&point).map_err(|_| AssertionError::Malformed {
        reason: "jwk does not encode a valid P-256 point".to_string(),
    })
}

/// Verifies a compact JWS against the JWK embedded in its own header.
///
/// This is the server side of the binding exchange; it is also what the
/// integration tests check produced tokens with.
///
/// # Errors
///
/// Returns an error if the token is malformed, names a different
/// algorithm, or the signature does not verify.
pub fn verify_assertion(jws: &str) -> Result<VerifiedAssertion, AssertionError> {
    let mut segments = jws.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AssertionError::Malformed {
            reason: "expected three dot-separated segments".to_string(),
        });
    };

    let header: JwsHeader = serde_json::from_slice(&decode_segment(header_b64, "header")?)?;
    if header.alg != JWS_ALGORITHM {
        return Err(AssertionError::UnsupportedAlgorithm { alg: header.alg });
    }
    let verifying_key = verifying_key_from_jwk(&header.jwk)?;
    let signature_bytes = decode_segment(signature_b64, "signature")?;
    let signature =
        Signature::from_slice(&signature_bytes).map_err(|_| AssertionError::Malformed {
            reason: "signature is not a valid P-256 signature".to_string(),
        })?;

    let signing_input = format!("{header_b64}.{claims_b64}");
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| AssertionError::InvalidSignature)?;

    let claims: AssertionClaims = serde_json::from_slice(&decode_segment(claims_b64, "claims")?)?;
    Ok(VerifiedAssertion {
        subject: claims.sub,
        challenge: claims.challenge,
        expires_at: claims.exp,
        kid: header.kid,
    })
}
