use crate::error::Error;
use crate::models::LaunchClaims;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use serde_json::{Map, Value};

/// Signature algorithms accepted from platforms unless the caller narrows
/// the list. LTI Advantage platforms sign launches with RSA keys.
pub const DEFAULT_ALLOWED_ALGS: &[Algorithm] =
    &[Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

/// Decoded JOSE header of a launch token.
#[derive(Debug, Clone)]
pub struct JwtHeader {
    pub alg: String,
    pub kid: Option<String>,
    pub typ: Option<String>,
    pub raw: Value,
}

/// A decoded (but not signature-verified) launch token.
///
/// Only produced by a fully successful [`decode_launch_token`]; there is no
/// partially-decoded state. `extra` holds the complete raw claim map for
/// claims the typed body does not model.
#[derive(Debug, Clone)]
pub struct LaunchToken {
    pub header: JwtHeader,
    pub body: LaunchClaims,
    pub extra: Map<String, Value>,
}

/// Decodes a compact JWT into header, typed body and raw claim map.
///
/// The signature is NOT checked here; pair with [`verify_with_public_key`]
/// once the platform's key is known. With `required_fields` set, `iss`,
/// `aud` and `exp` must be present in the body.
pub fn decode_launch_token(raw_jwt: &str, required_fields: bool) -> Result<LaunchToken, Error> {
    let parts: Vec<&str> = raw_jwt.split('.').collect();
    if parts.len() < 2 {
        return Err(malformed("jwt must have at least two parts"));
    }
    let header = decode_header_segment(parts[0])?;
    let body_bytes =
        base64_url_decode(parts[1]).map_err(|_| malformed("could not decode jwt body"))?;
    let body_raw: Value =
        serde_json::from_slice(&body_bytes).map_err(|_| malformed("could not decode jwt body"))?;
    if required_fields {
        for field in ["iss", "aud", "exp"] {
            if body_raw.get(field).is_none() {
                return Err(malformed(format!("missing {field} from jwt body")));
            }
        }
    }
    let extra = if parts.len() > 2 {
        body_raw.as_object().cloned().unwrap_or_default()
    } else {
        Map::new()
    };
    let body: LaunchClaims =
        serde_json::from_value(body_raw).map_err(|_| malformed("could not decode jwt body"))?;
    Ok(LaunchToken {
        header,
        body,
        extra,
    })
}

/// Signs a claim set into a compact JWT with an RSA PEM private key.
pub fn encode_jwt<T: Serialize>(
    claims: &T,
    private_key_pem: &str,
    alg: Algorithm,
) -> Result<String, Error> {
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())?;
    encode(&Header::new(alg), claims, &key).map_err(Error::from)
}

/// Verifies a compact JWT against a PEM public key and an algorithm
/// allow-list.
///
/// Every cryptographic, expiry or algorithm-mismatch failure comes back as
/// an `Err` value; this never panics. Audience and issuer matching are the
/// launch validator's responsibility and are not checked here.
pub fn verify_with_public_key(
    raw_jwt: &str,
    public_key_pem: &str,
    allowed_algs: &[Algorithm],
) -> Result<(), Error> {
    let Some(&first) = allowed_algs.first() else {
        return Err(Error::UnsupportedAlg(
            "no allowed algorithms configured".to_string(),
        ));
    };
    let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())?;
    let mut validation = Validation::new(first);
    validation.algorithms = allowed_algs.to_vec();
    validation.validate_aud = false;
    decode::<Value>(raw_jwt, &key, &validation)?;
    Ok(())
}

fn decode_header_segment(encoded: &str) -> Result<JwtHeader, Error> {
    let bytes = base64_url_decode(encoded).map_err(|_| malformed("could not decode jwt header"))?;
    let raw: Value =
        serde_json::from_slice(&bytes).map_err(|_| malformed("could not decode jwt header"))?;
    let alg = raw
        .get("alg")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing alg from jwt header"))?
        .to_string();
    let kid = raw.get("kid").and_then(Value::as_str).map(str::to_string);
    let typ = raw.get("typ").and_then(Value::as_str).map(str::to_string);
    Ok(JwtHeader { alg, kid, typ, raw })
}

fn base64_url_decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(data)
}

fn malformed(msg: impl Into<String>) -> Error {
    Error::MalformedToken(msg.into())
}
