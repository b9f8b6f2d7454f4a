//! Serialization.
//!
//! Fields are mapped onto the form like so:
//! - Scalar - One value under the field's key
//! - Option - `None` emits nothing; `Some` is encoded as its content
//! - Sequence - Every element, in order, under the field's key
//! - Map - One `key[subkey]` entry per map entry, holding a single value or a sequence
//! - Struct - Its fields are merged into the same form; nested records have no key prefix
//!
//! Text-capability values are encoded through their own conversion wherever they appear.

use serde::ser::{self, Impossible, Serialize, SerializeMap, SerializeSeq, SerializeStruct};
use tracing::trace;

use crate::coerce::{format_bool, format_float};
use crate::dynamic_key::dynamic_key;
use crate::error::{Error, Result};
use crate::tag::FieldTag;
use crate::text::{is_text_name, TEXT_ZERO_NAME};
use crate::FormMap;

/// Encode a record into a new form map.
///
/// `src` must be a struct, or a struct behind one `Option`. Nothing is returned on error.
pub fn marshal<T: Serialize + ?Sized>(src: &T) -> Result<FormMap> {
    let mut dest = FormMap::new();
    Encoder::new(&mut dest).encode(src)?;
    Ok(dest)
}

/// Encodes records into an existing form map, appending to any values already present.
pub struct Encoder<'a> {
    dest: &'a mut FormMap,
}

impl<'a> Encoder<'a> {
    pub fn new(dest: &'a mut FormMap) -> Self {
        Self { dest }
    }

    /// Encode one record. On error the destination map is left untouched.
    pub fn encode<T: Serialize + ?Sized>(&mut self, src: &T) -> Result<()> {
        let mut scratch = FormMap::new();
        src.serialize(RecordSerializer {
            dest: &mut scratch,
            unwrapped: false,
        })?;
        for (key, values) in scratch {
            self.dest.entry(key).or_default().extend(values);
        }
        Ok(())
    }
}

/// Leaf-value methods common to every serializer here. Each serializer supplies `scalar`, which
/// receives the leaf's kind name, whether it is the kind's zero value, and its text, plus
/// `unsupported` for shapes that have no meaning in its position.
macro_rules! serialize_leaves {
    ($($method:ident: $ty:ty => $kind:literal,)*) => {
        $(
            fn $method(self, v: $ty) -> Result<Self::Ok> {
                self.scalar($kind, v == 0, v.to_string())
            }
        )*

        fn serialize_bool(self, v: bool) -> Result<Self::Ok> {
            self.scalar("bool", !v, format_bool(v))
        }

        fn serialize_f32(self, v: f32) -> Result<Self::Ok> {
            self.scalar("f32", v == 0.0, format_float(f64::from(v)))
        }

        fn serialize_f64(self, v: f64) -> Result<Self::Ok> {
            self.scalar("f64", v == 0.0, format_float(v))
        }

        fn serialize_char(self, v: char) -> Result<Self::Ok> {
            self.scalar("char", v == '\0', v.to_string())
        }

        fn serialize_str(self, v: &str) -> Result<Self::Ok> {
            self.scalar("str", v.is_empty(), v.to_owned())
        }

        fn serialize_unit_variant(
            self,
            _name: &'static str,
            _variant_index: u32,
            variant: &'static str,
        ) -> Result<Self::Ok> {
            self.scalar("enum", false, variant.to_owned())
        }

        fn serialize_bytes(self, _v: &[u8]) -> Result<Self::Ok> {
            Err(Self::unsupported("bytes"))
        }

        fn serialize_unit(self) -> Result<Self::Ok> {
            Err(Self::unsupported("unit"))
        }

        fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok> {
            Err(Self::unsupported("unit struct"))
        }

        fn serialize_newtype_variant<T: Serialize + ?Sized>(
            self,
            _name: &'static str,
            _variant_index: u32,
            _variant: &'static str,
            _value: &T,
        ) -> Result<Self::Ok> {
            Err(Self::unsupported("newtype variant"))
        }

        fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
            Err(Self::unsupported("tuple"))
        }

        fn serialize_tuple_struct(
            self,
            _name: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleStruct> {
            Err(Self::unsupported("tuple struct"))
        }

        fn serialize_tuple_variant(
            self,
            _name: &'static str,
            _variant_index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleVariant> {
            Err(Self::unsupported("tuple variant"))
        }

        fn serialize_struct_variant(
            self,
            _name: &'static str,
            _variant_index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeStructVariant> {
            Err(Self::unsupported("struct variant"))
        }
    };
}

macro_rules! integer_leaves {
    () => {
        serialize_leaves! {
            serialize_i8: i8 => "i8",
            serialize_i16: i16 => "i16",
            serialize_i32: i32 => "i32",
            serialize_i64: i64 => "i64",
            serialize_i128: i128 => "i128",
            serialize_u8: u8 => "u8",
            serialize_u16: u16 => "u16",
            serialize_u32: u32 => "u32",
            serialize_u64: u64 => "u64",
            serialize_u128: u128 => "u128",
        }
    };
}

/// Entry point: accepts only a struct, optionally behind one `Option`.
struct RecordSerializer<'a> {
    dest: &'a mut FormMap,
    unwrapped: bool,
}

impl<'a> RecordSerializer<'a> {
    fn scalar(self, kind: &'static str, _zero: bool, _text: String) -> Result<()> {
        Err(Self::unsupported(kind))
    }

    fn unsupported(kind: &'static str) -> Error {
        Error::shape("source", kind)
    }
}

impl<'a> ser::Serializer for RecordSerializer<'a> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Impossible<(), Error>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = StructSerializer<'a>;
    type SerializeStructVariant = Impossible<(), Error>;

    integer_leaves!();

    fn serialize_none(self) -> Result<()> {
        Err(Self::unsupported("none"))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<()> {
        if self.unwrapped {
            return Err(Self::unsupported("option"));
        }
        v.serialize(RecordSerializer {
            dest: self.dest,
            unwrapped: true,
        })
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        v: &T,
    ) -> Result<()> {
        if is_text_name(name) {
            return Err(Self::unsupported("text value"));
        }
        v.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(Self::unsupported("sequence"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Self::unsupported("map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<StructSerializer<'a>> {
        Ok(StructSerializer { dest: self.dest })
    }
}

/// Walks a record's fields. Nested records reuse the same destination.
struct StructSerializer<'a> {
    dest: &'a mut FormMap,
}

impl<'a> SerializeStruct for StructSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        name: &'static str,
        value: &T,
    ) -> Result<()> {
        let tag = match FieldTag::parse(name) {
            Some(tag) => tag,
            None => {
                trace!(field = name, "field excluded from encoding");
                return Ok(());
            }
        };
        value
            .serialize(FieldSerializer {
                dest: &mut *self.dest,
                key: tag.key,
                omit_empty: tag.omit_empty,
            })
            .map_err(|e| e.encoding(tag.key))
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

/// Encodes one field's value under its logical key.
struct FieldSerializer<'a> {
    dest: &'a mut FormMap,
    key: &'a str,
    omit_empty: bool,
}

impl<'a> FieldSerializer<'a> {
    fn scalar(self, _kind: &'static str, zero: bool, text: String) -> Result<()> {
        if self.omit_empty && zero {
            trace!(key = self.key, "zero value omitted");
            return Ok(());
        }
        self.dest.entry(self.key.to_owned()).or_default().push(text);
        Ok(())
    }

    fn unsupported(kind: &'static str) -> Error {
        Error::UnsupportedKind(kind)
    }
}

impl<'a> ser::Serializer for FieldSerializer<'a> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = FieldSeqSerializer<'a>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = DynamicMapSerializer<'a>;
    type SerializeStruct = StructSerializer<'a>;
    type SerializeStructVariant = Impossible<(), Error>;

    integer_leaves!();

    fn serialize_none(self) -> Result<()> {
        trace!(key = self.key, "empty option omitted");
        Ok(())
    }

    /// A present optional is never zero, whatever it holds.
    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<()> {
        v.serialize(FieldSerializer {
            omit_empty: false,
            ..self
        })
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        v: &T,
    ) -> Result<()> {
        if name == TEXT_ZERO_NAME && self.omit_empty {
            trace!(key = self.key, "zero value omitted");
            Ok(())
        } else if is_text_name(name) {
            v.serialize(FieldSerializer {
                omit_empty: false,
                ..self
            })
        } else {
            v.serialize(self)
        }
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<FieldSeqSerializer<'a>> {
        Ok(FieldSeqSerializer {
            dest: self.dest,
            key: self.key,
            values: SeqCollector::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<DynamicMapSerializer<'a>> {
        Ok(DynamicMapSerializer {
            dest: self.dest,
            key: self.key,
            pending: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<StructSerializer<'a>> {
        Ok(StructSerializer { dest: self.dest })
    }
}

/// Accumulates the text of sequence elements. `None` elements have no form representation and
/// are dropped.
struct SeqCollector {
    values: Vec<String>,
    index: usize,
}

impl SeqCollector {
    fn with_capacity(len: usize) -> Self {
        Self {
            values: Vec::with_capacity(len),
            index: 0,
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let text = value.serialize(ElementSerializer).map_err(|e| {
            Error::context(
                format!("unable to encode sequence element {}", self.index),
                e,
            )
        })?;
        self.index += 1;
        if let Some(text) = text {
            self.values.push(text);
        }
        Ok(())
    }
}

impl SerializeSeq for SeqCollector {
    type Ok = Vec<String>;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<Vec<String>> {
        Ok(self.values)
    }
}

struct FieldSeqSerializer<'a> {
    dest: &'a mut FormMap,
    key: &'a str,
    values: SeqCollector,
}

impl<'a> SerializeSeq for FieldSeqSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.values.push(value)
    }

    /// An empty sequence emits no key at all, `omitempty` or not.
    fn end(self) -> Result<()> {
        let values = self.values.values;
        if values.is_empty() {
            trace!(key = self.key, "empty sequence omitted");
        } else {
            self.dest
                .entry(self.key.to_owned())
                .or_default()
                .extend(values);
        }
        Ok(())
    }
}

/// Writes each map entry as its own `key[subkey]` wire key.
struct DynamicMapSerializer<'a> {
    dest: &'a mut FormMap,
    key: &'a str,
    pending: Option<String>,
}

impl<'a> SerializeMap for DynamicMapSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        let sub_key = key
            .serialize(ElementSerializer)
            .and_then(|sub| sub.ok_or(Error::UnsupportedKind("empty map key")))
            .map_err(|e| Error::context("unable to encode map key", e))?;
        self.pending = Some(dynamic_key(self.key, &sub_key));
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let wire_key = self
            .pending
            .take()
            .ok_or_else(|| Error::Custom("map value serialized before its key".to_string()))?;
        let values = value
            .serialize(MapValueSerializer)
            .map_err(|e| Error::context(format!("unable to encode map key {}", wire_key), e))?;
        if values.is_empty() {
            trace!(key = wire_key.as_str(), "empty map entry omitted");
        } else {
            self.dest.entry(wire_key).or_default().extend(values);
        }
        Ok(())
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

/// Encodes a dynamic-map value: a single leaf or a sequence of leaves.
struct MapValueSerializer;

impl MapValueSerializer {
    fn scalar(self, _kind: &'static str, _zero: bool, text: String) -> Result<Vec<String>> {
        Ok(vec![text])
    }

    fn unsupported(kind: &'static str) -> Error {
        Error::UnsupportedKind(kind)
    }
}

impl ser::Serializer for MapValueSerializer {
    type Ok = Vec<String>;
    type Error = Error;
    type SerializeSeq = SeqCollector;
    type SerializeTuple = Impossible<Vec<String>, Error>;
    type SerializeTupleStruct = Impossible<Vec<String>, Error>;
    type SerializeTupleVariant = Impossible<Vec<String>, Error>;
    type SerializeMap = Impossible<Vec<String>, Error>;
    type SerializeStruct = Impossible<Vec<String>, Error>;
    type SerializeStructVariant = Impossible<Vec<String>, Error>;

    integer_leaves!();

    fn serialize_none(self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<Vec<String>> {
        v.serialize(self)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<Vec<String>> {
        v.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqCollector> {
        Ok(SeqCollector::with_capacity(len.unwrap_or(0)))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Self::unsupported("map in map value"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(Self::unsupported("struct in map value"))
    }
}

/// Encodes a single leaf: a sequence element, a map key, or a map value. `None` encodes to
/// nothing.
struct ElementSerializer;

impl ElementSerializer {
    fn scalar(self, _kind: &'static str, _zero: bool, text: String) -> Result<Option<String>> {
        Ok(Some(text))
    }

    fn unsupported(kind: &'static str) -> Error {
        Error::UnsupportedKind(kind)
    }
}

impl ser::Serializer for ElementSerializer {
    type Ok = Option<String>;
    type Error = Error;
    type SerializeSeq = Impossible<Option<String>, Error>;
    type SerializeTuple = Impossible<Option<String>, Error>;
    type SerializeTupleStruct = Impossible<Option<String>, Error>;
    type SerializeTupleVariant = Impossible<Option<String>, Error>;
    type SerializeMap = Impossible<Option<String>, Error>;
    type SerializeStruct = Impossible<Option<String>, Error>;
    type SerializeStructVariant = Impossible<Option<String>, Error>;

    integer_leaves!();

    fn serialize_none(self) -> Result<Option<String>> {
        Ok(None)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<Option<String>> {
        v.serialize(self)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<Option<String>> {
        v.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(Self::unsupported("nested sequence"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Self::unsupported("nested map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(Self::unsupported("nested struct"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Serialize;

    use super::*;

    #[derive(Serialize, Default)]
    struct Leaves {
        #[serde(rename = "s")]
        text: String,
        #[serde(rename = "i,omitempty")]
        int: i32,
        #[serde(rename = "u")]
        unsigned: u8,
        #[serde(rename = "f,omitempty")]
        float: f32,
        #[serde(rename = "b")]
        flag: bool,
        #[serde(rename = "-")]
        hidden: String,
        #[serde(skip)]
        private: String,
    }

    #[test]
    fn leaves() {
        let form = marshal(&Leaves {
            text: "hello".into(),
            int: 0,
            unsigned: 7,
            float: 1.5,
            flag: false,
            hidden: "secret".into(),
            private: "secret".into(),
        })
        .unwrap();
        assert_eq!(
            form,
            form! { "s" => ["hello"], "u" => ["7"], "f" => ["1.5"], "b" => ["false"] }
        );
    }

    #[derive(Serialize)]
    struct Collections {
        #[serde(rename = "seq")]
        seq: Vec<Option<i64>>,
        #[serde(rename = "empty")]
        empty: Vec<String>,
        #[serde(rename = "m")]
        map: BTreeMap<u16, Vec<bool>>,
        #[serde(rename = "opt")]
        opt: Option<Vec<u8>>,
    }

    #[test]
    fn collections() {
        let mut map = BTreeMap::new();
        map.insert(1, vec![true, false]);
        map.insert(2, vec![]);
        let form = marshal(&Collections {
            seq: vec![Some(1), None, Some(-3)],
            empty: vec![],
            map,
            opt: Some(vec![4, 5]),
        })
        .unwrap();
        assert_eq!(
            form,
            form! { "seq" => ["1", "-3"], "m[1]" => ["true", "false"], "opt" => ["4", "5"] }
        );
    }

    #[test]
    fn top_level_shape() {
        #[derive(Serialize)]
        struct Wrapper(Leaves);

        assert!(marshal(&Some(Leaves::default())).is_ok());
        assert!(marshal(&Wrapper(Leaves::default())).is_ok());
        assert!(matches!(
            marshal(&5i32),
            Err(Error::ShapeMismatch {
                role: "source",
                actual: "i32"
            })
        ));
        assert!(matches!(
            marshal(&vec![1, 2]),
            Err(Error::ShapeMismatch {
                actual: "sequence",
                ..
            })
        ));
        assert!(matches!(
            marshal::<Option<Leaves>>(&None),
            Err(Error::ShapeMismatch { actual: "none", .. })
        ));
        assert!(matches!(
            marshal(&Some(Some(Leaves::default()))),
            Err(Error::ShapeMismatch {
                actual: "option",
                ..
            })
        ));
    }

    #[test]
    fn unsupported_kind_names_field() {
        #[derive(Serialize)]
        struct Bad {
            #[serde(rename = "pair")]
            pair: (i32, i32),
        }

        let err = marshal(&Bad { pair: (1, 2) }).unwrap_err();
        assert_eq!(err.key(), Some("pair"));
        assert!(matches!(err.root_cause(), Error::UnsupportedKind("tuple")));
    }

    #[test]
    fn nested_sequence_is_unsupported() {
        #[derive(Serialize)]
        struct Bad {
            #[serde(rename = "grid")]
            grid: Vec<Vec<i32>>,
        }

        let err = marshal(&Bad {
            grid: vec![vec![1]],
        })
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to encode key 'grid': unable to encode sequence element 0: \
             unsupported kind nested sequence"
        );
    }

    #[test]
    fn encoder_appends_and_is_atomic() {
        #[derive(Serialize)]
        struct Pair {
            #[serde(rename = "a")]
            a: i32,
            #[serde(rename = "a,omitempty")]
            again: i32,
            #[serde(rename = "t")]
            t: (),
        }

        let mut dest = form! { "a" => ["0"] };
        let err = Encoder::new(&mut dest)
            .encode(&Pair { a: 1, again: 2, t: () })
            .unwrap_err();
        assert_eq!(err.key(), Some("t"));
        assert_eq!(dest, form! { "a" => ["0"] });

        #[derive(Serialize)]
        struct Twice {
            #[serde(rename = "a")]
            a: i32,
            #[serde(rename = "a,omitempty")]
            again: i32,
        }

        Encoder::new(&mut dest)
            .encode(&Twice { a: 1, again: 2 })
            .unwrap();
        assert_eq!(dest, form! { "a" => ["0", "1", "2"] });
    }
}
