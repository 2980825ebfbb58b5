//! Manual AWS SigV4 presigned-POST policy signing.
//!
//! `aws-sdk-s3` has no built-in equivalent of boto3's
//! `generate_presigned_post` (that's a boto3-only convenience); the SDK
//! only presigns individual requests (GET/PUT/HEAD) via
//! `PresigningConfig`. Enforcing the declared content type and the size
//! cap *at the store* (spec section 4.2 policy line), rather than only in
//! the API layer, requires a signed POST policy document, so this module
//! implements the SigV4 policy-signing algorithm directly: a base64 JSON
//! policy with `conditions` is signed with the standard
//! date/region/service/request HMAC-SHA256 key-derivation chain, exactly
//! as https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-post-example.html
//! specifies. Grounded on `original_source/services/api/s3_client.py`'s
//! `generate_presigned_upload_url`, whose `conditions` list (bucket, key,
//! Content-Type, `content-length-range`) is reproduced verbatim below.

use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

pub struct PostPolicyInputs<'a> {
    pub bucket: &'a str,
    pub key: &'a str,
    pub region: &'a str,
    pub content_type: &'a str,
    pub max_bytes: i64,
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub session_token: Option<&'a str>,
    pub now: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// The form fields a client must submit alongside the file for a presigned
/// POST upload, plus the policy/signature fields themselves.
pub fn sign(inputs: PostPolicyInputs<'_>) -> HashMap<String, String> {
    let amz_date = inputs.now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = inputs.now.format("%Y%m%d").to_string();
    let credential_scope = format!("{date_stamp}/{}/s3/aws4_request", inputs.region);
    let credential = format!("{}/{credential_scope}", inputs.access_key_id);

    let mut fields = HashMap::new();
    fields.insert("key".to_string(), inputs.key.to_string());
    fields.insert("Content-Type".to_string(), inputs.content_type.to_string());
    fields.insert("x-amz-algorithm".to_string(), "AWS4-HMAC-SHA256".to_string());
    fields.insert("x-amz-credential".to_string(), credential);
    fields.insert("x-amz-date".to_string(), amz_date.clone());
    if let Some(token) = inputs.session_token {
        fields.insert("x-amz-security-token".to_string(), token.to_string());
    }

    let mut conditions: Vec<serde_json::Value> = vec![
        serde_json::json!({ "bucket": inputs.bucket }),
        serde_json::json!(["eq", "$key", inputs.key]),
        serde_json::json!(["eq", "$Content-Type", inputs.content_type]),
        serde_json::json!(["content-length-range", 1, inputs.max_bytes]),
        serde_json::json!({ "x-amz-algorithm": "AWS4-HMAC-SHA256" }),
        serde_json::json!({ "x-amz-date": amz_date }),
    ];
    if let Some(token) = inputs.session_token {
        conditions.push(serde_json::json!({ "x-amz-security-token": token }));
    }
    for (field_key, value) in &fields {
        if field_key == "key" || field_key == "Content-Type" {
            continue;
        }
        if field_key == "x-amz-credential" {
            conditions.push(serde_json::json!({ "x-amz-credential": value }));
        }
    }

    let policy = serde_json::json!({
        "expiration": inputs.expires_at.to_rfc3339(),
        "conditions": conditions,
    });
    let policy_base64 =
        base64::engine::general_purpose::STANDARD.encode(serde_json::to_vec(&policy).unwrap());

    let signature = sign_policy(
        inputs.secret_access_key,
        &date_stamp,
        inputs.region,
        &policy_base64,
    );

    fields.insert("policy".to_string(), policy_base64);
    fields.insert("x-amz-signature".to_string(), signature);
    fields
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sign_policy(secret_access_key: &str, date_stamp: &str, region: &str, policy_base64: &str) -> String {
    let k_date = hmac_sha256(format!("AWS4{secret_access_key}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, b"s3");
    let k_signing = hmac_sha256(&k_service, b"aws4_request");
    hex::encode(hmac_sha256(&k_signing, policy_base64.as_bytes()))
}

/// SHA-256 hex digest, exposed for callers that need to verify uploaded
/// bytes independent of the signing path (unused by the adapter itself
/// today; kept alongside the signing code it shares a hasher with).
#[allow(dead_code)]
fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
