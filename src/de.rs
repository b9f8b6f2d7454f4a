//! Deserialization.
//!
//! Every tagged field of the destination is visited in declaration order and looked up by its
//! logical key. Fields with no values on the wire come out as their zero value, so a form that
//! omits a field and a record that never set it agree. Fields excluded from the form are visited
//! too, and always read as their zero value.
//!
//! Zero-filling means serde's field defaults never apply here. To keep values already set on a
//! record, decode over it with [`unmarshal_into`].

use serde::de::value::BorrowedStrDeserializer;
use serde::de::{
    Deserialize, DeserializeOwned, DeserializeSeed, Deserializer, IntoDeserializer, MapAccess,
    SeqAccess, Visitor,
};
use serde::Serialize;
use tracing::{debug, trace};

use crate::coerce;
use crate::dynamic_key::KeyPattern;
use crate::error::{Error, Result};
use crate::ser::marshal;
use crate::tag::FieldTag;
use crate::text::is_text_name;
use crate::FormMap;

/// Decode a record from a form map.
///
/// `T` must be a struct (or a newtype around one). Keys the record does not name are ignored.
pub fn unmarshal<'de, T: Deserialize<'de>>(src: &'de FormMap) -> Result<T> {
    Decoder::new(src).decode()
}

/// Decode a form map over an existing record.
///
/// Fields with values on the wire are replaced. Everything else keeps its current value, so
/// defaults can be set on `dest` before decoding. Map entries are merged by subkey. Fields
/// excluded from the form are reset to their zero value. On error `dest` is left untouched.
pub fn unmarshal_into<T: Serialize + DeserializeOwned>(
    src: &FormMap,
    dest: &mut T,
) -> Result<()> {
    Decoder::new(src).decode_into(dest)
}

/// Decodes records out of a borrowed form map. The map may be decoded any number of times, into
/// any number of record types.
#[derive(Clone, Copy, Debug)]
pub struct Decoder<'de> {
    src: &'de FormMap,
}

impl<'de> Decoder<'de> {
    pub fn new(src: &'de FormMap) -> Self {
        Self { src }
    }

    pub fn decode<T: Deserialize<'de>>(&self) -> Result<T> {
        T::deserialize(RecordDeserializer { src: self.src })
    }

    /// See [`unmarshal_into`].
    pub fn decode_into<T: Serialize + DeserializeOwned>(&self, dest: &mut T) -> Result<()> {
        let mut merged = marshal(dest)
            .map_err(|e| Error::context("error reading back the current record", e))?;
        let mut replaced = 0;
        for (key, values) in self.src {
            if !values.is_empty() {
                merged.insert(key.clone(), values.clone());
                replaced += 1;
            }
        }
        trace!(replaced, keys = merged.len(), "decoding over existing record");
        *dest = T::deserialize(RecordDeserializer { src: &merged })?;
        Ok(())
    }
}

/// Methods that fail the same way regardless of the visitor.
macro_rules! reject {
    ($err:expr; $($method:ident => $kind:literal,)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
                Err($err($kind))
            }
        )*
    };
}

/// Forward leaf requests to the deserializer returned by `self.leaf()`.
macro_rules! forward_to_leaf {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
                self.leaf().$method(visitor)
            }
        )*
    };
}

fn shape(kind: &'static str) -> Error {
    Error::shape("destination", kind)
}

/// Entry point: only a struct is accepted.
struct RecordDeserializer<'de> {
    src: &'de FormMap,
}

impl<'de> Deserializer<'de> for RecordDeserializer<'de> {
    type Error = Error;

    reject! { shape;
        deserialize_any => "any",
        deserialize_bool => "bool",
        deserialize_i8 => "i8",
        deserialize_i16 => "i16",
        deserialize_i32 => "i32",
        deserialize_i64 => "i64",
        deserialize_i128 => "i128",
        deserialize_u8 => "u8",
        deserialize_u16 => "u16",
        deserialize_u32 => "u32",
        deserialize_u64 => "u64",
        deserialize_u128 => "u128",
        deserialize_f32 => "f32",
        deserialize_f64 => "f64",
        deserialize_char => "char",
        deserialize_str => "str",
        deserialize_string => "string",
        deserialize_bytes => "bytes",
        deserialize_byte_buf => "bytes",
        deserialize_option => "option",
        deserialize_unit => "unit",
        deserialize_seq => "sequence",
        deserialize_map => "map",
        deserialize_identifier => "identifier",
        deserialize_ignored_any => "ignored",
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value> {
        Err(shape("unit struct"))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        if is_text_name(name) {
            return Err(shape("text value"));
        }
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> Result<V::Value> {
        Err(shape("tuple"))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value> {
        Err(shape("tuple struct"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_map(StructAccess::new(self.src, fields))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value> {
        Err(shape("enum"))
    }
}

/// Source for fields excluded from the form.
static NOTHING: FormMap = FormMap::new();

/// The field whose key was handed out last.
enum Pending {
    Tagged(FieldTag<'static>),
    Excluded(&'static str),
}

/// Presents a record's fields as a map, reading each value from the form.
struct StructAccess<'de> {
    src: &'de FormMap,
    fields: std::slice::Iter<'static, &'static str>,
    current: Option<Pending>,
}

impl<'de> StructAccess<'de> {
    fn new(src: &'de FormMap, fields: &'static [&'static str]) -> Self {
        Self {
            src,
            fields: fields.iter(),
            current: None,
        }
    }
}

impl<'de> MapAccess<'de> for StructAccess<'de> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        let name = match self.fields.next() {
            Some(&name) => name,
            None => return Ok(None),
        };
        self.current = Some(match FieldTag::parse(name) {
            Some(tag) => Pending::Tagged(tag),
            None => Pending::Excluded(name),
        });
        seed.deserialize(BorrowedStrDeserializer::<Error>::new(name)).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let pending = self
            .current
            .take()
            .ok_or_else(|| Error::Custom("field value requested before its key".to_string()))?;
        match pending {
            Pending::Tagged(tag) => seed
                .deserialize(FieldDeserializer {
                    src: self.src,
                    key: tag.key,
                })
                .map_err(|e| e.decoding(tag.key)),
            Pending::Excluded(name) => {
                trace!(field = name, "field excluded from decoding");
                seed.deserialize(FieldDeserializer {
                    src: &NOTHING,
                    key: name,
                })
                .map_err(|e| e.decoding(name))
            }
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len())
    }
}

/// Decodes one field from every wire value under its logical key.
struct FieldDeserializer<'de> {
    src: &'de FormMap,
    key: &'static str,
}

impl<'de> FieldDeserializer<'de> {
    fn values(&self) -> &'de [String] {
        self.src.get(self.key).map_or(&[], Vec::as_slice)
    }

    /// Single-value policy: scalars read the first wire value and ignore the rest.
    fn leaf(&self) -> ElementDeserializer<'de> {
        let text = self.values().first().map(String::as_str);
        if text.is_none() {
            trace!(key = self.key, "field absent from form");
        }
        ElementDeserializer { text }
    }

    fn pattern(&self) -> Result<KeyPattern> {
        KeyPattern::new(self.key).map_err(|source| Error::Pattern {
            key: self.key.to_owned(),
            source,
        })
    }
}

impl<'de> Deserializer<'de> for FieldDeserializer<'de> {
    type Error = Error;

    forward_to_leaf! {
        deserialize_any deserialize_bool
        deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64 deserialize_i128
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64 deserialize_u128
        deserialize_f32 deserialize_f64 deserialize_char deserialize_str deserialize_string
        deserialize_identifier
    }

    reject! { Error::UnsupportedKind;
        deserialize_bytes => "bytes",
        deserialize_byte_buf => "bytes",
        deserialize_unit => "unit",
    }

    /// `Some` only when the field's own key has values. An optional dynamic map is `None` even
    /// when bracketed entries exist.
    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if !self.values().is_empty() {
            visitor.visit_some(self)
        } else {
            trace!(key = self.key, "optional field absent from form");
            visitor.visit_none()
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_seq(ValuesAccess::new(self.values()))
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let entries = self.pattern()?.entries(self.src);
        debug!(key = self.key, matched = entries.len(), "dynamic map entries");
        visitor.visit_map(DynamicMapAccess {
            key: self.key,
            entries: entries.into_iter(),
            pending: None,
        })
    }

    /// Nested records share the form's flat namespace.
    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_map(StructAccess::new(self.src, fields))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        if is_text_name(name) {
            self.leaf().deserialize_newtype_struct(name, visitor)
        } else {
            visitor.visit_newtype_struct(self)
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        self.leaf().deserialize_enum(name, variants, visitor)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value> {
        Err(Error::UnsupportedKind("unit struct"))
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> Result<V::Value> {
        Err(Error::UnsupportedKind("tuple"))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value> {
        Err(Error::UnsupportedKind("tuple struct"))
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }
}

/// Yields one sequence element per wire value.
struct ValuesAccess<'de> {
    values: std::iter::Enumerate<std::slice::Iter<'de, String>>,
}

impl<'de> ValuesAccess<'de> {
    fn new(values: &'de [String]) -> Self {
        Self {
            values: values.iter().enumerate(),
        }
    }
}

impl<'de> SeqAccess<'de> for ValuesAccess<'de> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        match self.values.next() {
            Some((index, text)) => seed
                .deserialize(ElementDeserializer {
                    text: Some(text.as_str()),
                })
                .map(Some)
                .map_err(|e| Error::context(format!("error decoding element {}", index), e)),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.values.len())
    }
}

/// Yields one map entry per matching `key[subkey]` wire key.
struct DynamicMapAccess<'de> {
    key: &'static str,
    entries: std::vec::IntoIter<(&'de str, &'de [String])>,
    pending: Option<(&'de str, &'de [String])>,
}

impl<'de> MapAccess<'de> for DynamicMapAccess<'de> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        let (sub_key, values) = match self.entries.next() {
            Some(entry) => entry,
            None => return Ok(None),
        };
        self.pending = Some((sub_key, values));
        seed.deserialize(ElementDeserializer {
            text: Some(sub_key),
        })
        .map(Some)
        .map_err(|e| {
            Error::context(
                format!("error decoding map key '{}'", sub_key),
                e.decoding(self.key),
            )
        })
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let (sub_key, values) = self
            .pending
            .take()
            .ok_or_else(|| Error::Custom("map value requested before its key".to_string()))?;
        seed.deserialize(MapValueDeserializer { values })
            .map_err(|e| {
                Error::context(
                    format!("error decoding map value '{}'", sub_key),
                    e.decoding(self.key),
                )
            })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

/// Decodes a dynamic-map value: every wire value for a sequence, otherwise the first one.
struct MapValueDeserializer<'de> {
    values: &'de [String],
}

impl<'de> MapValueDeserializer<'de> {
    fn leaf(&self) -> ElementDeserializer<'de> {
        ElementDeserializer {
            text: self.values.first().map(String::as_str),
        }
    }
}

impl<'de> Deserializer<'de> for MapValueDeserializer<'de> {
    type Error = Error;

    forward_to_leaf! {
        deserialize_any deserialize_bool
        deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64 deserialize_i128
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64 deserialize_u128
        deserialize_f32 deserialize_f64 deserialize_char deserialize_str deserialize_string
        deserialize_bytes deserialize_byte_buf deserialize_unit
        deserialize_identifier deserialize_ignored_any
    }

    reject! { Error::UnsupportedKind;
        deserialize_map => "map in map value",
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_some(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_seq(ValuesAccess::new(self.values))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        if is_text_name(name) {
            self.leaf().deserialize_newtype_struct(name, visitor)
        } else {
            visitor.visit_newtype_struct(self)
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value> {
        Err(Error::UnsupportedKind("struct in map value"))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        self.leaf().deserialize_enum(name, variants, visitor)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        self.leaf().deserialize_unit_struct(name, visitor)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value> {
        self.leaf().deserialize_tuple(len, visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.leaf().deserialize_tuple_struct(name, len, visitor)
    }
}

/// Coerces at most one string into a leaf value. `None` means nothing was submitted and yields
/// the kind's zero value.
struct ElementDeserializer<'de> {
    text: Option<&'de str>,
}

macro_rules! deserialize_numbers {
    ($($method:ident => $visit:ident: $ty:ty = $parse:ident($bits:literal),)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
                let v = match self.text {
                    Some(text) => coerce::$parse(text, $bits)? as $ty,
                    None => <$ty>::default(),
                };
                visitor.$visit(v)
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ElementDeserializer<'de> {
    type Error = Error;

    deserialize_numbers! {
        deserialize_i8 => visit_i8: i8 = parse_int(8),
        deserialize_i16 => visit_i16: i16 = parse_int(16),
        deserialize_i32 => visit_i32: i32 = parse_int(32),
        deserialize_i64 => visit_i64: i64 = parse_int(64),
        deserialize_i128 => visit_i128: i128 = parse_int(128),
        deserialize_u8 => visit_u8: u8 = parse_uint(8),
        deserialize_u16 => visit_u16: u16 = parse_uint(16),
        deserialize_u32 => visit_u32: u32 = parse_uint(32),
        deserialize_u64 => visit_u64: u64 = parse_uint(64),
        deserialize_u128 => visit_u128: u128 = parse_uint(128),
        deserialize_f32 => visit_f32: f32 = parse_float(32),
        deserialize_f64 => visit_f64: f64 = parse_float(64),
    }

    reject! { Error::UnsupportedKind;
        deserialize_bytes => "bytes",
        deserialize_byte_buf => "bytes",
        deserialize_unit => "unit",
        deserialize_seq => "nested sequence",
        deserialize_map => "nested map",
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.text {
            Some(text) => visitor.visit_borrowed_str(text),
            None => visitor.visit_unit(),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = match self.text {
            Some(text) => coerce::parse_bool(text)?,
            None => false,
        };
        visitor.visit_bool(v)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = match self.text {
            Some(text) => coerce::parse_char(text)?,
            None => '\0',
        };
        visitor.visit_char(v)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_str(self.text.unwrap_or(""))
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.text {
            Some(_) => visitor.visit_some(self),
            None => visitor.visit_none(),
        }
    }

    /// Text-capability values see the raw string, or unit when nothing was submitted.
    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        if !is_text_name(name) {
            return visitor.visit_newtype_struct(self);
        }
        match self.text {
            Some(text) => visitor.visit_borrowed_str(text),
            None => visitor.visit_unit(),
        }
    }

    /// Fieldless enums travel as the variant name. Nothing submitted selects the first variant.
    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let variant = match self.text {
            Some(text) => text,
            None => variants
                .first()
                .copied()
                .ok_or(Error::UnsupportedKind("enum without variants"))?,
        };
        visitor.visit_enum(IntoDeserializer::<'de, Error>::into_deserializer(variant))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value> {
        Err(Error::UnsupportedKind("nested struct"))
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value> {
        Err(Error::UnsupportedKind("unit struct"))
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> Result<V::Value> {
        Err(Error::UnsupportedKind("tuple"))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value> {
        Err(Error::UnsupportedKind("tuple struct"))
    }
}
