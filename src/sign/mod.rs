//! Request signing
//!
//! Every outbound call to the content and auth APIs carries an `appkey` and a
//! `sign` parameter. The signature is the MD5 of the form-encoded, key-sorted
//! parameter set with the application secret appended.

use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::fmt;

/// A request parameter value
///
/// Integers are rendered with their plain decimal form so the signature never
/// depends on locale or float formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

/// A signed parameter set, ready to be sent as a query string or form body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Sorted parameters including `appkey`, followed by `sign`
    pub params: Vec<(String, String)>,

    /// Lowercase hex MD5 digest
    pub signature: String,
}

impl SignedRequest {
    /// Looks up a parameter value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Renders the parameters as a form-encoded string
    pub fn to_query_string(&self) -> String {
        encode_pairs(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// Signs a parameter set
///
/// # Algorithm
///
/// 1. Insert `appkey` into the parameter set
/// 2. Sort by key (byte order)
/// 3. Form-encode the sorted set
/// 4. Append the secret and take the MD5 hex digest
/// 5. Append the digest as `sign`
///
/// The result is independent of the iteration order of `params`.
///
/// # Examples
///
/// ```
/// use emote_harvester::sign::{sign, ParamValue};
///
/// let signed = sign(
///     vec![("id", ParamValue::from(10i64)), ("ts", ParamValue::from(1700000000i64))],
///     "key",
///     "secret",
/// );
/// assert_eq!(signed.get("appkey"), Some("key"));
/// assert_eq!(signed.signature.len(), 32);
/// ```
pub fn sign<I, K, V>(params: I, app_key: &str, app_secret: &str) -> SignedRequest
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ParamValue>,
{
    let mut sorted: BTreeMap<String, String> = params
        .into_iter()
        .map(|(k, v)| (k.into(), v.into().to_string()))
        .collect();
    sorted.insert("appkey".to_string(), app_key.to_string());

    let query = encode_pairs(sorted.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    let mut hasher = Md5::new();
    hasher.update(query.as_bytes());
    hasher.update(app_secret.as_bytes());
    let signature = hex::encode(hasher.finalize());

    let mut params: Vec<(String, String)> = sorted.into_iter().collect();
    params.push(("sign".to_string(), signature.clone()));

    SignedRequest { params, signature }
}

/// Form-encodes `key=value` pairs joined by `&`
///
/// Spaces become `+`. Unlike the WHATWG form serializer, `~` is kept and `*`
/// is escaped, which is what the signing servers expect.
fn encode_pairs<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut encoded = String::new();
    for (k, v) in pairs {
        if !encoded.is_empty() {
            encoded.push('&');
        }
        encoded.push_str(&encode_component(k));
        encoded.push('=');
        encoded.push_str(&encode_component(v));
    }
    encoded
}

fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
        .replace("%7E", "~")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> Vec<(&'static str, ParamValue)> {
        vec![
            ("ts", ParamValue::Int(1700000000)),
            ("mobi_app", ParamValue::from("android_i")),
            (
                "statistics",
                ParamValue::from(r#"{"appId":14,"platform":3}"#),
            ),
            ("id", ParamValue::Int(10)),
        ]
    }

    #[test]
    fn test_known_signature() {
        let signed = sign(sample_params(), "testkey", "testsecret");
        assert_eq!(signed.signature, "568ac3b8ccd014787e28eef923f13e8d");
    }

    #[test]
    fn test_form_encoding_rules() {
        let signed = sign(vec![("b", "x&y=z"), ("a", "hello world")], "k", "s");
        assert_eq!(
            signed.to_query_string(),
            "a=hello+world&appkey=k&b=x%26y%3Dz&sign=9e4835255e777c58bfdaccabb82e6dd3"
        );
    }

    #[test]
    fn test_tilde_kept_and_asterisk_escaped() {
        let signed = sign(vec![("a", "x~y*z")], "k", "s");
        assert_eq!(signed.signature, "2555452be98235b27182d4f2cd688ddc");
        assert_eq!(
            signed.to_query_string(),
            "a=x~y%2Az&appkey=k&sign=2555452be98235b27182d4f2cd688ddc"
        );
    }

    #[test]
    fn test_escaped_input_not_rewritten() {
        assert_eq!(encode_component("%7E*"), "%257E%2A");
    }

    #[test]
    fn test_deterministic() {
        let first = sign(sample_params(), "testkey", "testsecret");
        let second = sign(sample_params(), "testkey", "testsecret");
        assert_eq!(first, second);
    }

    #[test]
    fn test_order_invariant() {
        let mut reversed = sample_params();
        reversed.reverse();

        let forward = sign(sample_params(), "testkey", "testsecret");
        let backward = sign(reversed, "testkey", "testsecret");
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_params_sorted_with_sign_last() {
        let signed = sign(sample_params(), "testkey", "testsecret");
        let keys: Vec<&str> = signed.params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["appkey", "id", "mobi_app", "statistics", "ts", "sign"]
        );
        assert_eq!(signed.get("sign"), Some(signed.signature.as_str()));
    }

    #[test]
    fn test_caller_appkey_is_overwritten() {
        let signed = sign(vec![("appkey", "bogus")], "real", "secret");
        assert_eq!(signed.get("appkey"), Some("real"));
        assert_eq!(signed.params.len(), 2);
    }

    #[test]
    fn test_secret_changes_signature() {
        let a = sign(sample_params(), "testkey", "secret-a");
        let b = sign(sample_params(), "testkey", "secret-b");
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn test_integer_formatting() {
        assert_eq!(ParamValue::Int(-42).to_string(), "-42");
        assert_eq!(ParamValue::from(8230800u32).to_string(), "8230800");
    }
}
