//! Tolerant flat-object payload codec.
//!
//! Inscription payloads are flat JSON objects in which every key and every
//! value is a quoted scalar: `{"p":"cns","op":"reg","cns":"alice"}`. The
//! parser here is deliberately *not* a general JSON parser — it strips the
//! outer braces, splits on top-level commas, then on the first colon of
//! each pair, trimming whitespace and surrounding quotes. Anything it cannot
//! make sense of yields `None`; the data already indexed on live chains was
//! written against exactly these rules, so they must not tighten.
//!
//! The serializer is the inverse: sorted keys, every value quoted. Stored
//! records round-trip byte-for-byte across processes.

use std::collections::BTreeMap;

/// A parsed flat payload: string keys to string values, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadMap {
    entries: BTreeMap<String, String>,
}

impl PayloadMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a flat object. Returns `None` unless the trimmed input is
    /// brace-delimited; pairs without a colon are skipped, not rejected.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if !(trimmed.starts_with('{') && trimmed.ends_with('}')) || trimmed.len() < 2 {
            return None;
        }
        let body = &trimmed[1..trimmed.len() - 1];

        let mut entries = BTreeMap::new();
        for item in body.split(',') {
            let Some((raw_key, raw_value)) = item.split_once(':') else {
                continue;
            };
            let key = unquote(raw_key.trim());
            let value = unquote(raw_value.trim());
            if !key.is_empty() {
                entries.insert(key.to_string(), value.to_string());
            }
        }
        Some(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Value parsed as a decimal i64.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.parse().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Serialize as a flat object with sorted keys and quoted values.
    pub fn to_json(&self) -> String {
        let mut out = String::with_capacity(2 + self.entries.len() * 16);
        out.push('{');
        let mut first = true;
        for (key, value) in &self.entries {
            if !first {
                out.push(',');
            }
            first = false;
            out.push('"');
            out.push_str(key);
            out.push_str("\":\"");
            out.push_str(value);
            out.push('"');
        }
        out.push('}');
        out
    }
}

fn unquote(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_inscription() {
        let map = PayloadMap::parse(r#"{"p":"cns","op":"reg","cns":"alice"}"#).unwrap();
        assert_eq!(map.get("p"), Some("cns"));
        assert_eq!(map.get("op"), Some("reg"));
        assert_eq!(map.get("cns"), Some("alice"));
    }

    #[test]
    fn key_order_does_not_matter() {
        let a = PayloadMap::parse(r#"{"op":"reg","p":"cns","cns":"x"}"#).unwrap();
        let b = PayloadMap::parse(r#"{"cns":"x","p":"cns","op":"reg"}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tolerates_whitespace_and_missing_quotes() {
        let map = PayloadMap::parse(" { \"p\" : cns ,\n op:\"reg\" } ").unwrap();
        assert_eq!(map.get("p"), Some("cns"));
        assert_eq!(map.get("op"), Some("reg"));
    }

    #[test]
    fn value_keeps_everything_after_first_colon() {
        let map = PayloadMap::parse(r#"{"relay":"ipfs://x"}"#).unwrap();
        assert_eq!(map.get("relay"), Some("ipfs://x"));
    }

    #[test]
    fn rejects_non_objects() {
        assert!(PayloadMap::parse("").is_none());
        assert!(PayloadMap::parse("plain text").is_none());
        assert!(PayloadMap::parse(r#"["p","op"]"#).is_none());
        assert!(PayloadMap::parse("{").is_none());
    }

    #[test]
    fn pairs_without_colon_are_skipped() {
        let map = PayloadMap::parse(r#"{"p":"cns",garbage,"op":"reg"}"#).unwrap();
        assert_eq!(map.get("p"), Some("cns"));
        assert_eq!(map.get("op"), Some("reg"));
    }

    #[test]
    fn integers_come_back_as_decimal_strings() {
        let map = PayloadMap::parse(r#"{"max":"100","amt":"-3","lim":"x"}"#).unwrap();
        assert_eq!(map.get_i64("max"), Some(100));
        assert_eq!(map.get_i64("amt"), Some(-3));
        assert_eq!(map.get_i64("lim"), None);
    }

    #[test]
    fn serializer_sorts_keys_and_quotes_values() {
        let mut map = PayloadMap::new();
        map.insert("op", "reg").insert("cns", "alice").insert("p", "cns");
        assert_eq!(map.to_json(), r#"{"cns":"alice","op":"reg","p":"cns"}"#);
    }

    #[test]
    fn roundtrips_through_serialize() {
        let original = PayloadMap::parse(r#"{"p":"cdns","op":"upd","cns":"a","relay":"r"}"#).unwrap();
        let reparsed = PayloadMap::parse(&original.to_json()).unwrap();
        assert_eq!(original, reparsed);
    }
}
