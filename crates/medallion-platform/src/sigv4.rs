// SPDX-License-Identifier: Apache-2.0

//! AWS Signature Version 4 for the S3-compatible object store.

use crate::error::{PlatformError, PlatformErrorCode};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, PlatformError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| PlatformError::new(PlatformErrorCode::Internal, e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Percent-encodes everything except RFC 3986 unreserved characters (and `/` when kept).
#[must_use]
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct SigningKeys<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
}

#[derive(Debug, Clone)]
pub struct CanonicalRequest<'a> {
    pub method: &'a str,
    /// Unencoded absolute path, e.g. `/bucket/key`.
    pub path: &'a str,
    pub query: &'a [(String, String)],
    /// Headers to sign; names are lowercased and values trimmed during canonicalization.
    pub headers: &'a [(String, String)],
    pub payload_hash: &'a str,
}

impl CanonicalRequest<'_> {
    #[must_use]
    pub fn canonical_query(&self) -> String {
        let mut pairs: Vec<(String, String)> = self
            .query
            .iter()
            .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
            .collect();
        pairs.sort();
        pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn canonical_headers(&self) -> (String, String) {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                let value = v.split_whitespace().collect::<Vec<_>>().join(" ");
                (k.to_ascii_lowercase(), value)
            })
            .collect();
        headers.sort();
        let canonical = headers
            .iter()
            .map(|(k, v)| format!("{k}:{v}\n"))
            .collect::<String>();
        let signed = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");
        (canonical, signed)
    }

    #[must_use]
    pub fn to_canonical_string(&self) -> (String, String) {
        let (headers, signed) = self.canonical_headers();
        let path = if self.path.is_empty() { "/" } else { self.path };
        let canonical = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method,
            uri_encode(path, false),
            self.canonical_query(),
            headers,
            signed,
            self.payload_hash
        );
        (canonical, signed)
    }
}

/// Computes the `Authorization` header value; `amz_date` is `YYYYMMDDTHHMMSSZ`.
pub fn authorization_header(
    keys: &SigningKeys<'_>,
    request: &CanonicalRequest<'_>,
    amz_date: &str,
) -> Result<String, PlatformError> {
    let date = amz_date.get(..8).ok_or_else(|| {
        PlatformError::new(PlatformErrorCode::Validation, "amz date must be YYYYMMDDTHHMMSSZ")
    })?;
    let scope = format!("{date}/{}/{}/aws4_request", keys.region, keys.service);
    let (canonical, signed_headers) = request.to_canonical_string();
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical.as_bytes())
    );

    let k_date = hmac(format!("AWS4{}", keys.secret_key).as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, keys.region.as_bytes())?;
    let k_service = hmac(&k_region, keys.service.as_bytes())?;
    let k_signing = hmac(&k_service, b"aws4_request")?;
    let signature = hex::encode(hmac(&k_signing, string_to_sign.as_bytes())?);

    Ok(format!(
        "{ALGORITHM} Credential={}/{scope},SignedHeaders={signed_headers},Signature={signature}",
        keys.access_key
    ))
}
