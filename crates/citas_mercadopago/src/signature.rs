//! `x-signature` validation for MercadoPago webhook notifications.
//!
//! The header looks like `ts=1704908010,v1=<hex hmac>`. The signed manifest is
//! `id:<data.id>;request-id:<x-request-id>;ts:<ts>;`, where parts whose value is
//! missing are left out, and the HMAC key is the webhook secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::error::MercadoPagoError;

type HmacSha256 = Hmac<Sha256>;

/// Builds the string MercadoPago signs.
pub fn signature_manifest(data_id: Option<&str>, request_id: Option<&str>, ts: &str) -> String {
    let mut manifest = String::new();
    if let Some(id) = data_id.filter(|id| !id.is_empty()) {
        // Alphanumeric ids are signed in lowercase.
        manifest.push_str(&format!("id:{};", id.to_lowercase()));
    }
    if let Some(request_id) = request_id.filter(|id| !id.is_empty()) {
        manifest.push_str(&format!("request-id:{};", request_id));
    }
    manifest.push_str(&format!("ts:{};", ts));
    manifest
}

fn parse_header(header: &str) -> (Option<&str>, Option<&str>) {
    let mut ts = None;
    let mut v1 = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => ts = Some(value.trim()),
            Some(("v1", value)) => v1 = Some(value.trim()),
            _ => {}
        }
    }
    (ts, v1)
}

/// Checks `x-signature` against the webhook secret.
pub fn verify_signature(
    secret: &str,
    signature_header: Option<&str>,
    request_id: Option<&str>,
    data_id: Option<&str>,
) -> Result<(), MercadoPagoError> {
    let header = signature_header
        .ok_or_else(|| MercadoPagoError::Signature("missing x-signature header".into()))?;
    let (ts, v1) = parse_header(header);
    let ts = ts.ok_or_else(|| MercadoPagoError::Signature("missing ts in x-signature".into()))?;
    let v1 = v1.ok_or_else(|| MercadoPagoError::Signature("missing v1 in x-signature".into()))?;
    let provided = hex::decode(v1)
        .map_err(|_| MercadoPagoError::Signature("v1 is not hex".into()))?;

    let manifest = signature_manifest(data_id, request_id, ts);
    debug!("Verifying webhook manifest {}", manifest);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| MercadoPagoError::Signature("invalid webhook secret".into()))?;
    mac.update(manifest.as_bytes());
    mac.verify_slice(&provided)
        .map_err(|_| MercadoPagoError::Signature("signature mismatch".into()))
}

/// Hex HMAC of a manifest; used to sign test notifications.
pub fn sign_manifest(secret: &str, manifest: &str) -> Result<String, MercadoPagoError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| MercadoPagoError::Signature("invalid webhook secret".into()))?;
    mac.update(manifest.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_skips_missing_parts() {
        assert_eq!(
            signature_manifest(Some("ABC123"), Some("req-1"), "1704908010"),
            "id:abc123;request-id:req-1;ts:1704908010;"
        );
        assert_eq!(
            signature_manifest(None, None, "1704908010"),
            "ts:1704908010;"
        );
    }

    #[test]
    fn test_valid_signature_passes() {
        let manifest = signature_manifest(Some("123456"), Some("req-1"), "1704908010");
        let v1 = sign_manifest("whsec", &manifest).unwrap();
        let header = format!("ts=1704908010,v1={}", v1);

        assert!(verify_signature("whsec", Some(&header), Some("req-1"), Some("123456")).is_ok());
    }

    #[test]
    fn test_tampered_or_missing_signature_fails() {
        let manifest = signature_manifest(Some("123456"), Some("req-1"), "1704908010");
        let v1 = sign_manifest("whsec", &manifest).unwrap();
        let header = format!("ts=1704908010,v1={}", v1);

        assert!(verify_signature("whsec", Some(&header), Some("req-1"), Some("999999")).is_err());
        assert!(verify_signature("other", Some(&header), Some("req-1"), Some("123456")).is_err());
        assert!(verify_signature("whsec", None, Some("req-1"), Some("123456")).is_err());
        assert!(verify_signature("whsec", Some("ts=1,v1=zz"), None, None).is_err());
    }
}
