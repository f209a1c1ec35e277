//! AWS Signature Version 4 request signing
//!
//! The event-stream provider authenticates with an access key pair, so its
//! requests must carry a SigV4 `Authorization` header. This implements the
//! standard derivation (canonical request, string to sign, chained HMAC
//! key) for the small shape of request this crate sends, without pulling
//! in the provider's SDK.
//!
//! Verified against the published reference vector in the signing
//! documentation (see tests).

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Everything needed to sign one request
///
/// `amz_date` is the full timestamp (`20150830T123600Z`); the credential
/// scope date is its first eight characters. `query` must already be in
/// canonical form (sorted, URI-encoded). Headers are canonicalized here.
#[derive(Debug, Clone)]
pub struct SigningRequest<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
    pub amz_date: &'a str,
    pub method: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    /// Additional headers to sign, as (lowercase-name, value) pairs;
    /// `host` and `x-amz-date` are always included
    pub headers: &'a [(&'a str, &'a str)],
    pub payload: &'a [u8],
}

/// The computed `Authorization` header value
pub fn authorization_header(request: &SigningRequest<'_>) -> String {
    let (signed_headers, canonical_headers) = canonical_header_block(request);
    let payload_hash = hex_sha256(request.payload);

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        request.path,
        request.query,
        canonical_headers,
        signed_headers,
        payload_hash
    );

    let date = &request.amz_date[..8];
    let scope = format!(
        "{}/{}/{}/aws4_request",
        date, request.region, request.service
    );
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        request.amz_date,
        scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(
        request.secret_access_key,
        date,
        request.region,
        request.service,
    );
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, request.access_key_id, scope, signed_headers, signature
    )
}

/// Hex-encoded SHA-256 digest of the payload, for the `x-amz-content-sha256`
/// header some services require
pub fn payload_hash(payload: &[u8]) -> String {
    hex_sha256(payload)
}

/// Current timestamp in the `x-amz-date` wire format
pub fn amz_date_now() -> String {
    chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
}

/// Percent-encode one path segment the way the signing scheme expects
///
/// Unreserved characters (`A-Z a-z 0-9 - _ . ~`) pass through; everything
/// else, including `:` in model identifiers, is encoded. The encoded form
/// is used both on the wire and in the canonical URI so the two agree.
pub fn uri_encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Build the sorted canonical header block and the signed-headers list
fn canonical_header_block(request: &SigningRequest<'_>) -> (String, String) {
    let mut pairs: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_lowercase(), value.trim().to_string()))
        .collect();
    pairs.push(("host".to_string(), request.host.to_string()));
    pairs.push(("x-amz-date".to_string(), request.amz_date.to_string()));
    pairs.sort();

    let signed_headers = pairs
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers = pairs
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect::<String>();

    (signed_headers, canonical_headers)
}

/// Chained HMAC key derivation: date, region, service, terminator
fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
