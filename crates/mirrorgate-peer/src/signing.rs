//! Request signing for the peer management API.
//!
//! The peer authenticates query-string RPC calls with an HMAC-SHA256
//! signature: lower-case every key and value, sort the pairs
//! lexicographically (with the api key folded in as `apikey=...`), sign
//! the canonical string with the registered secret, then append the
//! base64 signature to the original, unsorted query.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Percent-encode one query value (form encoding, space becomes `+`).
pub fn url_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Assemble the request query: `command=<cmd>` first, then each parameter
/// with its value encoded, in the caller's order.
pub fn build_query(command: &str, params: &[(String, String)]) -> String {
    let mut query = format!("command={}", command);
    for (key, value) in params {
        query.push('&');
        query.push_str(key);
        query.push('=');
        query.push_str(&url_encode(value));
    }
    query
}

/// Canonicalise the already-encoded query for signing: fold in the api
/// key, lower-case every `k=v` pair, sort lexicographically.
pub fn canonical_query(query: &str, api_key: &str) -> String {
    let mut entries: Vec<String> = vec![format!("apikey={}", url_encode(api_key).to_lowercase())];
    for pair in query.split('&') {
        entries.push(pair.to_lowercase());
    }
    entries.sort();
    entries.join("&")
}

/// Base64 HMAC-SHA256 of the canonical string.
pub fn sign(canonical: &str, secret_key: &str) -> String {
    // HMAC accepts keys of any length; new_from_slice cannot fail here.
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .expect("hmac accepts any key length");
    mac.update(canonical.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Final signed URL: base + original query + `apiKey` + percent-encoded
/// signature. The signature is computed over the canonical form but
/// appended to the unsorted original.
pub fn build_signed_url(
    api_base: &str,
    command: &str,
    params: &[(String, String)],
    api_key: &str,
    secret_key: &str,
) -> String {
    let query = build_query(command, params);
    let signature = sign(&canonical_query(&query, api_key), secret_key);
    format!(
        "{}?{}&apiKey={}&signature={}",
        api_base,
        query,
        api_key,
        url_encode(&signature)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn query_preserves_caller_order() {
        let q = build_query("createVolume", &pairs(&[("zoneid", "z-1"), ("name", "vol a")]));
        assert_eq!(q, "command=createVolume&zoneid=z-1&name=vol+a");
    }

    #[test]
    fn canonical_is_lowercased_and_sorted() {
        let q = build_query("listStoragePools", &pairs(&[("name", "VOL-A")]));
        let canonical = canonical_query(&q, "TestApiKey");
        assert_eq!(
            canonical,
            "apikey=testapikey&command=liststoragepools&name=vol-a"
        );
    }

    #[test]
    fn signature_matches_known_vector() {
        // HMAC-SHA256("topsecret", canonical) cross-checked externally.
        let sig = sign("apikey=testapikey&command=liststoragepools&name=vol-a", "topsecret");
        assert_eq!(sig, "OqiUmU3kYUFh0BuHzpXOej8SJY5ZrKybFUCMjKr9IrE=");
    }

    #[test]
    fn second_known_vector_with_encoded_value() {
        let sig = sign("apikey=ak&command=createvolume&name=data%20disk&size=20", "sk");
        assert_eq!(sig, "0hqYv40Gnl0wMwQCwjfPQ+3dPeogNhiG8gH9nRPRTKI=");
    }

    #[test]
    fn signed_url_appends_to_the_original_query() {
        let url = build_signed_url(
            "https://peer.example/client/api/",
            "listStoragePools",
            &pairs(&[("name", "VOL-A")]),
            "TestApiKey",
            "topsecret",
        );
        // Original (unsorted, original-case) query survives verbatim.
        assert!(url.starts_with(
            "https://peer.example/client/api/?command=listStoragePools&name=VOL-A&apiKey=TestApiKey&signature="
        ));
        // Signature is percent-encoded (base64 padding becomes %3D).
        assert!(url.ends_with("signature=OqiUmU3kYUFh0BuHzpXOej8SJY5ZrKybFUCMjKr9IrE%3D"));
    }

    #[test]
    fn encoding_covers_reserved_characters() {
        assert_eq!(url_encode("a b"), "a+b");
        assert_eq!(url_encode("k=v&x"), "k%3Dv%26x");
    }
}
