//! Text capability: types that convert themselves to and from a single string.
//!
//! A type implementing [`TextEncode`] and [`TextDecode`] bypasses the built-in coercion rules
//! wherever it appears: as a field, behind an `Option`, as a sequence element, or as a
//! dynamic-map value. There are three ways to plug one in:
//!
//! - [`text_serde!`](crate::text_serde) implements `Serialize`/`Deserialize` for the type itself.
//! - [`Text<T>`] wraps a value at the use site.
//! - `#[serde(with = "form_pack::text")]` on a single field.
//!
//! Capability values travel through serde as a newtype struct with a reserved name, which the
//! form walkers recognize. Any other serde format sees a plain string.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::ser::{self, Serialize, Serializer};

pub(crate) const TEXT_NAME: &str = "$form_pack::Text";
pub(crate) const TEXT_ZERO_NAME: &str = "$form_pack::Text::Zero";

pub(crate) fn is_text_name(name: &str) -> bool {
    name == TEXT_NAME || name == TEXT_ZERO_NAME
}

/// Failure reported by a text capability.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TextError(String);

impl TextError {
    pub fn new<M: fmt::Display>(msg: M) -> Self {
        Self(msg.to_string())
    }
}

/// Converts a value into its text form.
pub trait TextEncode {
    fn encode_text(&self) -> Result<String, TextError>;

    /// Whether this is the type's zero value, which `omitempty` leaves out of the encoding.
    fn is_zero(&self) -> bool {
        false
    }
}

/// Reads a value from its text form. A field absent from the form decodes to `Default`.
pub trait TextDecode: Sized + Default {
    fn decode_text(text: &str) -> Result<Self, TextError>;
}

/// Serialize through the text capability. Usable with `#[serde(serialize_with)]`.
pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: TextEncode + ?Sized,
    S: Serializer,
{
    let text = value
        .encode_text()
        .map_err(<S::Error as ser::Error>::custom)?;
    let name = if value.is_zero() {
        TEXT_ZERO_NAME
    } else {
        TEXT_NAME
    };
    serializer.serialize_newtype_struct(name, text.as_str())
}

/// Deserialize through the text capability. Usable with `#[serde(deserialize_with)]`.
pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: TextDecode,
    D: Deserializer<'de>,
{
    deserializer.deserialize_newtype_struct(TEXT_NAME, TextVisitor(PhantomData))
}

struct TextVisitor<T>(PhantomData<T>);

impl<'de, T: TextDecode> Visitor<'de> for TextVisitor<T> {
    type Value = T;

    fn expecting(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str("a text-encoded value")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<T, E> {
        T::decode_text(v).map_err(<E as de::Error>::custom)
    }

    /// Nothing was submitted for this value.
    fn visit_unit<E: de::Error>(self) -> Result<T, E> {
        Ok(T::default())
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(self, deserializer: D) -> Result<T, D::Error> {
        deserializer.deserialize_str(self)
    }
}

/// Implement `Serialize` and `Deserialize` for a type through its text capability.
///
/// ```
/// use form_pack::{TextDecode, TextEncode, TextError};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Hex(u32);
///
/// impl TextEncode for Hex {
///     fn encode_text(&self) -> Result<String, TextError> {
///         Ok(format!("{:x}", self.0))
///     }
/// }
///
/// impl TextDecode for Hex {
///     fn decode_text(text: &str) -> Result<Self, TextError> {
///         u32::from_str_radix(text, 16).map(Hex).map_err(TextError::new)
///     }
/// }
///
/// form_pack::text_serde!(Hex);
/// ```
#[macro_export]
macro_rules! text_serde {
    ($ty:ty) => {
        impl $crate::serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
            where
                S: $crate::serde::Serializer,
            {
                $crate::text::serialize(self, serializer)
            }
        }

        impl<'de> $crate::serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
            where
                D: $crate::serde::Deserializer<'de>,
            {
                $crate::text::deserialize(deserializer)
            }
        }
    };
}

/// Use-site wrapper routing a value through its text capability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Text<T>(pub T);

impl<T> Text<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Text<T> {
    fn from(v: T) -> Self {
        Text(v)
    }
}

impl<T> Deref for Text<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Text<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: TextEncode> Serialize for Text<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize(&self.0, serializer)
    }
}

impl<'de, T: TextDecode> Deserialize<'de> for Text<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize(deserializer).map(Text)
    }
}
