//! Bracketed keys: a map-valued field `m` travels as a family of keys `m[a]`, `m[b]`, ...
//!
//! Only one bracket level is supported and subkeys are not escaped. A subkey runs to the final
//! `]` of the wire key, so `m[a][b]` is subkey `a][b` of `m`, not a nested map.

use regex::Regex;

use crate::FormMap;

/// Build the wire key for one entry of a map-valued field.
pub fn dynamic_key(key: &str, sub_key: &str) -> String {
    format!("{}[{}]", key, sub_key)
}

/// Matches the wire keys belonging to one map-valued field.
#[derive(Clone, Debug)]
pub struct KeyPattern {
    regex: Regex,
}

impl KeyPattern {
    /// Compile the matcher for a logical key. The key is matched literally.
    pub fn new(key: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!(r"(?s)^{}\[(.*)\]$", regex::escape(key)))?;
        Ok(Self { regex })
    }

    /// Extract the subkey from a wire key, if it belongs to this field.
    pub fn sub_key<'k>(&self, wire_key: &'k str) -> Option<&'k str> {
        self.regex
            .captures(wire_key)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// All matching entries of a form map that carry at least one value, as
    /// `(subkey, values)` pairs in wire-key order.
    pub fn entries<'a>(&self, src: &'a FormMap) -> Vec<(&'a str, &'a [String])> {
        src.iter()
            .filter(|(_, values)| !values.is_empty())
            .filter_map(|(wire_key, values)| {
                self.sub_key(wire_key).map(|sub| (sub, values.as_slice()))
            })
            .collect()
    }

    /// Whether any wire key with at least one value belongs to this field.
    pub fn has_entries(&self, src: &FormMap) -> bool {
        src.iter()
            .any(|(wire_key, values)| !values.is_empty() && self.regex.is_match(wire_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate() {
        assert_eq!(dynamic_key("m", "a"), "m[a]");
        assert_eq!(dynamic_key("m", ""), "m[]");
    }

    #[test]
    fn brackets_in_sub_key_read_back() {
        let pattern = KeyPattern::new("m").unwrap();
        for sub in ["a]b", "[x]", "]"] {
            assert_eq!(pattern.sub_key(&dynamic_key("m", sub)), Some(sub));
        }
    }

    #[test]
    fn match_sub_keys() {
        let pattern = KeyPattern::new("m").unwrap();
        assert_eq!(pattern.sub_key("m[a]"), Some("a"));
        assert_eq!(pattern.sub_key("m[]"), Some(""));
        assert_eq!(pattern.sub_key("m[a][b]"), Some("a][b"));
        assert_eq!(pattern.sub_key("m[a]]"), Some("a]"));
        assert_eq!(pattern.sub_key("m[a"), None);
        assert_eq!(pattern.sub_key("mm[a]"), None);
        assert_eq!(pattern.sub_key("xm[a]"), None);
        assert_eq!(pattern.sub_key("m"), None);
        assert_eq!(pattern.sub_key("m[line\nbreak]"), Some("line\nbreak"));
    }

    #[test]
    fn key_is_literal() {
        let pattern = KeyPattern::new("a.b+").unwrap();
        assert_eq!(pattern.sub_key("a.b+[x]"), Some("x"));
        assert_eq!(pattern.sub_key("axbb[x]"), None);
    }

    #[test]
    fn entries_skip_empty() {
        let src = form! {
            "m[a]" => ["1", "2"],
            "m[b]" => [],
            "m[c]" => ["3"],
            "m" => ["ignored"],
            "n[a]" => ["4"],
        };
        let pattern = KeyPattern::new("m").unwrap();
        let entries = pattern.entries(&src);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "a");
        assert_eq!(entries[0].1, ["1".to_string(), "2".to_string()]);
        assert_eq!(entries[1].0, "c");
        assert!(pattern.has_entries(&src));
        assert!(!KeyPattern::new("z").unwrap().has_entries(&src));
        assert!(!KeyPattern::new("m").unwrap().has_entries(&form! { "m[b]" => [] }));
    }
}
