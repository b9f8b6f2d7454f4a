//! A serde codec between typed records and flat form maps.
//!
//! A form map is what a URL-encoded request body looks like once it has been parsed: every key
//! holds an ordered list of strings. form-pack maps the fields of a struct onto such a map and
//! back again, driven entirely by the struct's serde field names.
//!
//! The field name is the field's tag: `key` or `key,omitempty`. A field renamed to `-`, or
//! skipped by serde, is left out of the form entirely.
//!
//! ```
//! use std::collections::HashMap;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Debug, PartialEq)]
//! struct Search {
//!     #[serde(rename = "q")]
//!     query: String,
//!     #[serde(rename = "page,omitempty")]
//!     page: u32,
//!     #[serde(rename = "tag")]
//!     tags: Vec<String>,
//!     #[serde(rename = "filter")]
//!     filters: HashMap<String, String>,
//! }
//!
//! let search = Search {
//!     query: "rust".into(),
//!     page: 0,
//!     tags: vec!["serde".into(), "forms".into()],
//!     filters: HashMap::from([("lang".into(), "en".into())]),
//! };
//!
//! let form = form_pack::marshal(&search).unwrap();
//! assert_eq!(form["q"], ["rust"]);
//! assert_eq!(form["tag"], ["serde", "forms"]);
//! assert_eq!(form["filter[lang]"], ["en"]);
//! assert!(!form.contains_key("page"));
//!
//! let back: Search = form_pack::unmarshal(&form).unwrap();
//! assert_eq!(back, search);
//! ```
//!
//! Fields are mapped by shape:
//!
//! - Scalars (integers, floats, `bool`, `char`, strings, fieldless enums) read the first value
//!   under their key and write one value.
//! - `Option<T>` is `None` when nothing was submitted under its own key.
//! - Sequences take every value under their key, in order.
//! - Maps become a family of bracketed keys, `key[subkey]`, one bracket level deep.
//! - Nested structs share the same flat namespace as their parent.
//!
//! Types with their own string form implement [`TextEncode`] and [`TextDecode`], which take
//! priority over the rules above. [`Duration`] and [`Timestamp`] are provided.

#[cfg(test)]
macro_rules! form {
    ($($key:expr => [$($val:expr),* $(,)?]),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::FormMap::new();
        $(
            map.insert($key.to_string(), vec![$($val.to_string()),*]);
        )*
        map
    }};
}

mod coerce;
mod de;
mod duration;
mod dynamic_key;
mod error;
mod ser;
mod tag;
pub mod text;
#[cfg(feature = "timestamp")]
mod timestamp;


use std::collections::BTreeMap;

#[doc(hidden)]
pub use serde;

pub use coerce::{ScalarError, ScalarErrorKind, ScalarKind};
pub use de::{unmarshal, unmarshal_into, Decoder};
pub use duration::{Duration, DurationError};
pub use dynamic_key::{dynamic_key, KeyPattern};
pub use error::{Error, Result};
pub use ser::{marshal, Encoder};
pub use tag::FieldTag;
pub use text::{Text, TextDecode, TextEncode, TextError};
#[cfg(feature = "timestamp")]
pub use timestamp::Timestamp;

/// The flat wire shape: each key maps to its values in submission order.
pub type FormMap = BTreeMap<String, Vec<String>>;
