//! Field tags.
//!
//! A field's serde name doubles as its tag: `key` or `key,omitempty`. The key is matched against
//! the form map; `omitempty` leaves zero values out when encoding and has no effect on decoding.
//! A tag that is empty or whose key is `-` excludes the field.

/// The parsed tag of one record field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldTag<'a> {
    /// Logical key matched against the form map.
    pub key: &'a str,
    pub omit_empty: bool,
}

impl<'a> FieldTag<'a> {
    /// Parse a field tag, returning `None` when the field is excluded from the codec.
    pub fn parse(tag: &'a str) -> Option<Self> {
        let (key, options) = tag.split_once(',').unwrap_or((tag, ""));
        if key.is_empty() || key == "-" {
            return None;
        }
        let omit_empty = options.split(',').any(|opt| opt == "omitempty");
        Some(FieldTag { key, omit_empty })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_key() {
        assert_eq!(
            FieldTag::parse("int_param"),
            Some(FieldTag {
                key: "int_param",
                omit_empty: false
            })
        );
    }

    #[test]
    fn omitempty_anywhere_after_key() {
        assert!(FieldTag::parse("x,omitempty").unwrap().omit_empty);
        assert!(FieldTag::parse("x,string,omitempty").unwrap().omit_empty);
        assert!(!FieldTag::parse("x,omitEmpty").unwrap().omit_empty);
        assert!(!FieldTag::parse("x,").unwrap().omit_empty);
    }

    #[test]
    fn excluded() {
        assert_eq!(FieldTag::parse(""), None);
        assert_eq!(FieldTag::parse("-"), None);
        assert_eq!(FieldTag::parse("-,omitempty"), None);
        assert_eq!(FieldTag::parse(",omitempty"), None);
    }

    #[test]
    fn malformed_keeps_first_segment() {
        let tag = FieldTag::parse("a,,b").unwrap();
        assert_eq!(tag.key, "a");
        assert!(!tag.omit_empty);
        assert_eq!(FieldTag::parse("-x").unwrap().key, "-x");
    }
}
