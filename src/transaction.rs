//! Recorded transaction data model

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RewindError;

/// Header map of a recorded request or response
///
/// `None` values round-trip as `null` in the recording file. The map is
/// ordered so recordings stay diff-stable in version control.
pub type Headers = BTreeMap<String, Option<String>>;

/// Querystring map of a recorded request, keyed by decoded parameter name
pub type QueryString = BTreeMap<String, QueryValue>;

/// HTTP method of a recorded request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl Method {
    /// Every method the interception layer registers universal handlers for
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Head,
        Method::Options,
    ];

    /// Uppercase wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = RewindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            other => Err(RewindError::Config(format!("unknown HTTP method: {other}"))),
        }
    }
}

/// A querystring value
///
/// Parsed parameters are stored as lists; a literal filter substitution
/// stores a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// Scalar value, typically a filter substitution
    One(String),
    /// Parameter values in wire order
    Many(Vec<String>),
}

/// Marker prefix for binary bodies stored in text form
const BINARY_MARKER: &str = "hex:";

/// Decoded request or response body
///
/// Decoding attempts UTF-8 text, then JSON; raw bytes that are not valid
/// UTF-8 are kept reversibly as a `hex:`-prefixed string in the recording.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// UTF-8 text that did not parse as JSON
    Text(String),
    /// JSON document decoded from the wire bytes
    Json(serde_json::Value),
    /// Raw bytes that were not valid UTF-8
    Binary(Vec<u8>),
}

impl Body {
    /// Decode raw wire bytes
    #[must_use]
    pub fn decode(raw: &[u8]) -> Self {
        match std::str::from_utf8(raw) {
            Ok(text) => match serde_json::from_str::<serde_json::Value>(text) {
                Ok(value) => Body::Json(value),
                Err(_) => Body::Text(text.to_string()),
            },
            Err(_) => Body::Binary(raw.to_vec()),
        }
    }

    /// Exact bytes served for this body on replay
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Body::Text(text) => text.clone().into_bytes(),
            Body::Json(value) => {
                serde_json::to_vec(value).expect("JSON value serialization cannot fail")
            }
            Body::Binary(bytes) => bytes.clone(),
        }
    }

    /// Transfer length used for `Content-Length` recomputation
    ///
    /// `None` for binary bodies, whose stored marker no longer reflects the
    /// wire length.
    #[must_use]
    pub fn transfer_len(&self) -> Option<usize> {
        match self {
            Body::Binary(_) => None,
            _ => Some(self.to_bytes().len()),
        }
    }
}

impl Serialize for Body {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Body::Text(text) => serializer.serialize_str(text),
            Body::Json(value) => value.serialize(serializer),
            Body::Binary(bytes) => {
                serializer.serialize_str(&format!("{BINARY_MARKER}{}", hex::encode(bytes)))
            }
        }
    }
}

impl<'de> Deserialize<'de> for Body {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::String(text) => match text.strip_prefix(BINARY_MARKER) {
                Some(rest) => match hex::decode(rest) {
                    Ok(bytes) => Body::Binary(bytes),
                    Err(_) => Body::Text(text),
                },
                None => Body::Text(text),
            },
            other => Body::Json(other),
        })
    }
}

/// Recorded request half of a transaction
///
/// `uri` holds scheme, host, and path; the querystring is stripped and kept
/// separately in `querystring`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Filtered base URI without querystring
    pub uri: String,
    /// HTTP method
    pub method: Method,
    /// Filtered request headers
    pub headers: Headers,
    /// Decoded request body
    pub body: Body,
    /// Filtered querystring parameters
    pub querystring: QueryString,
}

/// Recorded response half of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    /// HTTP status code
    pub status: u16,
    /// Decoded response body
    pub body: Body,
    /// Filtered response headers
    pub headers: Headers,
}

/// One recorded request/response pair, immutable once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Request half
    pub request: RequestRecord,
    /// Response half
    pub response: ResponseRecord,
}
