//! OAuth 1.0 HMAC-SHA1 request signing.
//!
//! Tool endpoints verify signed form fields (body-style signing), not an
//! `Authorization` header, so the output here is the launch body plus the
//! `oauth_*` fields, ready to render as hidden form inputs. Query parameters
//! already on the launch URL participate in the signature but stay on the
//! URL, per RFC 5849 section 3.4.1.3.

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::Url;

use super::body::LaunchParams;
use crate::error::{LtiError, Result};

type HmacSha1 = Hmac<Sha1>;

/// Signs a launch body for POSTing to `launch_url`.
pub fn sign(
    body: &LaunchParams,
    consumer_key: &str,
    consumer_secret: &str,
    launch_url: &str,
) -> Result<LaunchParams> {
    sign_at(
        body,
        consumer_key,
        consumer_secret,
        launch_url,
        &nonce(),
        chrono::Utc::now().timestamp(),
    )
}

/// Signing with explicit nonce and timestamp. Split out so tests can pin both
/// and assert exact signatures.
fn sign_at(
    body: &LaunchParams,
    consumer_key: &str,
    consumer_secret: &str,
    launch_url: &str,
    nonce: &str,
    timestamp: i64,
) -> Result<LaunchParams> {
    let url = Url::parse(launch_url).map_err(|e| {
        LtiError::Configuration(format!("invalid launch URL '{launch_url}': {e}"))
    })?;

    let oauth_params = [
        ("oauth_consumer_key", consumer_key.to_string()),
        ("oauth_nonce", nonce.to_string()),
        ("oauth_timestamp", timestamp.to_string()),
        ("oauth_signature_method", "HMAC-SHA1".to_string()),
        ("oauth_version", "1.0".to_string()),
    ];

    let mut signing_set: Vec<(String, String)> = body
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    signing_set.extend(
        oauth_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone())),
    );
    for (k, v) in url.query_pairs() {
        signing_set.push((k.into_owned(), v.into_owned()));
    }

    let base_string = signature_base_string(&url, &signing_set);
    let signature = compute_signature(&base_string, consumer_secret);

    let mut signed = body.clone();
    for (k, v) in oauth_params {
        signed.insert(k.to_string(), v);
    }
    signed.insert("oauth_signature".to_string(), signature);
    Ok(signed)
}

/// `POST&<encoded base URI>&<encoded normalized params>`.
fn signature_base_string(url: &Url, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    // Byte-wise ascending by encoded key, then encoded value.
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "POST&{}&{}",
        percent_encode(&base_uri(url)),
        percent_encode(&normalized)
    )
}

/// Scheme://host[:port]/path with query and fragment stripped. The url crate
/// already lowercases scheme/host and drops default ports.
fn base_uri(url: &Url) -> String {
    let scheme = url.scheme();
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{scheme}://{host}:{port}{}", url.path()),
        None => format!("{scheme}://{host}{}", url.path()),
    }
}

/// RFC 3986 percent-encoding with the unreserved set (`A-Z a-z 0-9 - . _ ~`).
fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn compute_signature(base_string: &str, consumer_secret: &str) -> String {
    // No token secret in LTI launches, so the key ends with a bare '&'.
    let signing_key = format!("{}&", percent_encode(consumer_secret));
    let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(base_string.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

fn nonce() -> String {
    use rand::distr::Alphanumeric;
    use rand::{Rng, rng};

    rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
