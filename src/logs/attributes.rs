//! Server attributes propagated from `SERVER_*` environment variables into the
//! upload query string.
use serde::Deserialize;
use tracing::warn;

use crate::logs::encoding::encode_component;

pub const SERVER_ATTRIBUTE_PREFIX: &str = "SERVER_";
/// Reserved for the stream name, which is always sent as `server-logstream`.
pub const RESERVED_STREAM_KEY: &str = "SERVER_LOGSTREAM";

/// How attribute values are written into the query string.
///
/// `Raw` interpolates values as they are, so a value holding `&` or `=` splits into extra
/// query parameters. Upload consumers rely on that output, which is why it stays the default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeEncoding {
    #[default]
    Raw,
    Percent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerAttribute {
    /// Camel-cased key without the `SERVER_` prefix.
    pub key: String,
    pub value: String,
}

impl ServerAttribute {
    #[must_use]
    pub fn query_fragment(&self, encoding: AttributeEncoding) -> String {
        match encoding {
            AttributeEncoding::Raw => format!("&server-{}={}", self.key, self.value),
            AttributeEncoding::Percent => {
                format!("&server-{}={}", self.key, encode_component(&self.value))
            }
        }
    }
}

/// Selects the `SERVER_*` entries, skipping the reserved stream key, in enumeration order.
#[must_use]
pub fn extract<I, K, V>(entries: I) -> Vec<ServerAttribute>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    entries
        .into_iter()
        .filter_map(|(key, value)| {
            let key = key.as_ref();
            if key == RESERVED_STREAM_KEY {
                return None;
            }
            let suffix = key.strip_prefix(SERVER_ATTRIBUTE_PREFIX)?;
            let key = camel_case(suffix);
            if key.is_empty() {
                return None;
            }
            Some(ServerAttribute {
                key,
                value: value.into(),
            })
        })
        .collect()
}

/// Concatenates the `&server-<key>=<value>` fragments for the upload URL.
#[must_use]
pub fn query_fragments(attributes: &[ServerAttribute], encoding: AttributeEncoding) -> String {
    if encoding == AttributeEncoding::Raw {
        let unescaped: Vec<&str> = attributes
            .iter()
            .filter(|attribute| {
                attribute
                    .value
                    .contains(|c: char| matches!(c, '&' | '=' | '#') || c.is_whitespace())
            })
            .map(|attribute| attribute.key.as_str())
            .collect();
        if !unescaped.is_empty() {
            warn!(
                "Server attributes {:?} hold characters that are not escaped in the upload query string, set ATTRIBUTE_ENCODING=percent to escape them",
                unescaped
            );
        }
    }
    attributes
        .iter()
        .map(|attribute| attribute.query_fragment(encoding))
        .collect()
}

/// `REGION2_NAME` -> `region2Name`, `fooBar` -> `fooBar`, `HTTPServer` -> `httpServer`.
#[must_use]
pub fn camel_case(input: &str) -> String {
    split_words(input)
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_ascii_lowercase();
            if i == 0 {
                return lower;
            }
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => lower,
            }
        })
        .collect()
}

fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    for chunk in input
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|chunk| !chunk.is_empty())
    {
        let chars: Vec<char> = chunk.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            if let Some(&prev) = i.checked_sub(1).and_then(|p| chars.get(p)) {
                let next = chars.get(i + 1).copied();
                let boundary = (prev.is_ascii_lowercase() && c.is_ascii_uppercase())
                    || (prev.is_ascii_digit() != c.is_ascii_digit())
                    || (prev.is_ascii_uppercase()
                        && c.is_ascii_uppercase()
                        && next.is_some_and(|n| n.is_ascii_lowercase()));
                if boundary && !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            current.push(c);
        }
        if !current.is_empty() {
            words.push(current);
        }
    }
    words
}
