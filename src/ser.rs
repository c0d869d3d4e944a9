//! Serialization to compact JSON.
//!
//! Output is canonical for maps: every map is buffered and written out with its keys in ascending
//! byte order, regardless of the order the `Serialize` implementation produced them in. Structs
//! keep their declaration order, unless they contain a `#[serde(flatten)]` field: serde writes
//! those as maps, so the whole struct comes out sorted.
//!
//! Strings are escaped as `serde_json` does it. `<`, `>` and `&` are written as-is.
//!
//! Enum variants, when mapped, are:
//! - Unit - Just the variant name as a string
//! - Newtype - Object with one pair. Key is variant name, content is the value
//! - Tuple - Object with one pair. Key is variant name, content is the tuple as an array
//! - Struct - Object with one pair. Key is variant name, content is the struct
//!
//! Byte sequences become base64 strings, and non-finite floats are rejected.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::ser::*;
use std::{collections::BTreeMap, mem};

use crate::depth_tracking::DepthTracker;
use crate::error::{Error, Result};

/// Serialize a value to a compact JSON string, failing if it nests deeper than `max_depth`.
pub(crate) fn to_json_string<T: Serialize + ?Sized>(value: &T, max_depth: usize) -> Result<String> {
    let mut se = JsonSerializer::new(max_depth);
    value.serialize(&mut se)?;
    debug_assert_eq!(se.depth_tracking.depth(), 0);
    // Everything written is either ASCII punctuation or came out of serde_json/base64
    String::from_utf8(se.buf).map_err(|e| Error::SerdeFail(e.to_string()))
}

struct JsonSerializer {
    depth_tracking: DepthTracker,
    buf: Vec<u8>,
}

impl JsonSerializer {
    fn new(max_depth: usize) -> Self {
        JsonSerializer {
            depth_tracking: DepthTracker::new(max_depth),
            buf: Vec::new(),
        }
    }

    fn write_str(&mut self, v: &str) -> Result<()> {
        serde_json::to_writer(&mut self.buf, v)?;
        Ok(())
    }

    fn write_scalar<T: Serialize>(&mut self, v: T) -> Result<()> {
        serde_json::to_writer(&mut self.buf, &v)?;
        Ok(())
    }

    /// Open a single-pair object holding an enum variant's content.
    fn begin_variant(&mut self, variant: &str) -> Result<()> {
        self.depth_tracking.descend()?;
        self.buf.push(b'{');
        self.write_str(variant)?;
        self.buf.push(b':');
        Ok(())
    }

    fn end_variant(&mut self) {
        self.buf.push(b'}');
        self.depth_tracking.ascend();
    }
}

impl<'a> Serializer for &'a mut JsonSerializer {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = SeqSerializer<'a>;
    type SerializeTuple = SeqSerializer<'a>;
    type SerializeTupleStruct = SeqSerializer<'a>;
    type SerializeTupleVariant = SeqSerializer<'a>;
    type SerializeMap = MapSerializer<'a>;
    type SerializeStruct = StructSerializer<'a>;
    type SerializeStructVariant = StructSerializer<'a>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        let v: &[u8] = if v { b"true" } else { b"false" };
        self.buf.extend_from_slice(v);
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.write_scalar(v)
    }

    fn serialize_i128(self, v: i128) -> Result<()> {
        self.write_scalar(v)
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.write_scalar(v)
    }

    fn serialize_u128(self, v: u128) -> Result<()> {
        self.write_scalar(v)
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        if !v.is_finite() {
            return Err(Error::UnsupportedValue(format!("float {}", v)));
        }
        self.write_scalar(v)
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        if !v.is_finite() {
            return Err(Error::UnsupportedValue(format!("float {}", v)));
        }
        self.write_scalar(v)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        let mut tmp = [0u8; 4];
        self.write_str(v.encode_utf8(&mut tmp))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.write_str(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.write_str(&STANDARD.encode(v))
    }

    fn serialize_none(self) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.buf.extend_from_slice(b"null");
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()> {
        self.begin_variant(variant)?;
        value.serialize(&mut *self)?;
        self.end_variant();
        Ok(())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        SeqSerializer::new(self, false)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        SeqSerializer::new(self, false)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        // Tuple structs usually just discard the name
        SeqSerializer::new(self, false)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.begin_variant(variant)?;
        SeqSerializer::new(self, true)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        MapSerializer::new(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        StructSerializer::new(self, false)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        self.begin_variant(variant)?;
        StructSerializer::new(self, true)
    }
}

/// Arrays of any kind: sequences, tuples, tuple structs, and the inner part of tuple variants.
struct SeqSerializer<'a> {
    se: &'a mut JsonSerializer,
    first: bool,
    in_variant: bool,
}

impl<'a> SeqSerializer<'a> {
    fn new(se: &'a mut JsonSerializer, in_variant: bool) -> Result<Self> {
        se.depth_tracking.descend()?;
        se.buf.push(b'[');
        Ok(Self {
            se,
            first: true,
            in_variant,
        })
    }

    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        if !mem::replace(&mut self.first, false) {
            self.se.buf.push(b',');
        }
        value.serialize(&mut *self.se)
    }

    fn finish(self) -> Result<()> {
        self.se.buf.push(b']');
        self.se.depth_tracking.ascend();
        if self.in_variant {
            self.se.end_variant();
        }
        Ok(())
    }
}

impl<'a> SerializeSeq for SeqSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> SerializeTuple for SeqSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> SerializeTupleStruct for SeqSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> SerializeTupleVariant for SeqSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

/// Objects built from maps. Each value is rendered into its own buffer and stored off by key, so
/// the object can be written out in key order once the map is complete.
struct MapSerializer<'a> {
    se: &'a mut JsonSerializer,
    map: BTreeMap<String, Vec<u8>>,
    pending_key: String,
}

impl<'a> MapSerializer<'a> {
    fn new(se: &'a mut JsonSerializer) -> Result<Self> {
        se.depth_tracking.descend()?;
        Ok(Self {
            se,
            map: BTreeMap::new(),
            pending_key: String::new(),
        })
    }
}

impl<'a> SerializeMap for MapSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        // Turn the key into a String or fail (this clears out the string before serializing)
        value.serialize(KeySerializer::new(&mut self.pending_key))
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        // Slot in buffer, fill it like we're writing to the actual buffer, then store it off for
        // later reordering
        let buf = mem::take(&mut self.se.buf);
        let result = value.serialize(&mut *self.se);
        let buf = mem::replace(&mut self.se.buf, buf);
        result?;
        let key = mem::take(&mut self.pending_key);
        self.map.insert(key, buf);
        Ok(())
    }

    fn end(self) -> Result<()> {
        let MapSerializer { se, map, .. } = self;
        se.buf.push(b'{');
        for (i, (key, value)) in map.iter().enumerate() {
            if i > 0 {
                se.buf.push(b',');
            }
            se.write_str(key)?;
            se.buf.push(b':');
            se.buf.extend_from_slice(value);
        }
        se.buf.push(b'}');
        se.depth_tracking.ascend();
        Ok(())
    }
}

/// Objects built from structs, written out directly in field order.
struct StructSerializer<'a> {
    se: &'a mut JsonSerializer,
    first: bool,
    in_variant: bool,
}

impl<'a> StructSerializer<'a> {
    fn new(se: &'a mut JsonSerializer, in_variant: bool) -> Result<Self> {
        se.depth_tracking.descend()?;
        se.buf.push(b'{');
        Ok(Self {
            se,
            first: true,
            in_variant,
        })
    }

    fn serialize_field_inner<T: Serialize + ?Sized>(
        &mut self,
        field: &'static str,
        value: &T,
    ) -> Result<()> {
        if !mem::replace(&mut self.first, false) {
            self.se.buf.push(b',');
        }
        self.se.write_str(field)?;
        self.se.buf.push(b':');
        value.serialize(&mut *self.se)
    }

    fn end_inner(self) -> Result<()> {
        self.se.buf.push(b'}');
        self.se.depth_tracking.ascend();
        if self.in_variant {
            self.se.end_variant();
        }
        Ok(())
    }
}

impl<'a> SerializeStruct for StructSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        field: &'static str,
        value: &T,
    ) -> Result<()> {
        self.serialize_field_inner(field, value)
    }

    fn end(self) -> Result<()> {
        self.end_inner()
    }
}

impl<'a> SerializeStructVariant for StructSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        field: &'static str,
        value: &T,
    ) -> Result<()> {
        self.serialize_field_inner(field, value)
    }

    fn end(self) -> Result<()> {
        self.end_inner()
    }
}

/// Turns a map key into a string. Strings, chars, unit variants, and integers are accepted;
/// integers are written out in decimal.
struct KeySerializer<'a> {
    s: &'a mut String,
}

impl<'a> KeySerializer<'a> {
    fn new(s: &'a mut String) -> Self {
        s.clear();
        Self { s }
    }

    fn ser_fail(&self, received: &'static str) -> Error {
        let s = format!("map key must be a string, received {}", received);
        Error::SerdeFail(s)
    }

    fn push_int<T: ToString>(self, v: T) -> Result<()> {
        self.s.push_str(&v.to_string());
        Ok(())
    }
}

impl<'a> Serializer for KeySerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_char(self, v: char) -> Result<()> {
        self.s.push(v);
        Ok(())
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.s.push_str(v);
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.s.push_str(variant);
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.push_int(v)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.push_int(v)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.push_int(v)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.push_int(v)
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.push_int(v)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.push_int(v)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.push_int(v)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.push_int(v)
    }

    type SerializeSeq = Impossible<(), Error>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = Impossible<(), Error>;
    type SerializeStructVariant = Impossible<(), Error>;

    fn serialize_bool(self, _: bool) -> Result<()> {
        Err(self.ser_fail("bool"))
    }

    fn serialize_f32(self, _: f32) -> Result<()> {
        Err(self.ser_fail("f32"))
    }

    fn serialize_f64(self, _: f64) -> Result<()> {
        Err(self.ser_fail("f64"))
    }

    fn serialize_bytes(self, _: &[u8]) -> Result<()> {
        Err(self.ser_fail("bytes"))
    }

    fn serialize_none(self) -> Result<()> {
        Err(self.ser_fail("none"))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, _: &T) -> Result<()> {
        Err(self.ser_fail("some"))
    }

    fn serialize_unit(self) -> Result<()> {
        Err(self.ser_fail("unit"))
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<()> {
        Err(self.ser_fail("unit_struct"))
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()> {
        Err(self.ser_fail("newtype_variant"))
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(self.ser_fail("seq"))
    }

    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple> {
        Err(self.ser_fail("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(self.ser_fail("tuple_struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(self.ser_fail("tuple_variant"))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        Err(self.ser_fail("map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(self.ser_fail("struct"))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(self.ser_fail("struct_variant"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::HashMap;

    fn enc<T: Serialize + ?Sized>(v: &T) -> String {
        to_json_string(v, crate::MAX_DEPTH).unwrap()
    }

    #[derive(Serialize)]
    struct Employee {
        user: String,
        city: String,
        age: u32,
    }

    #[derive(Serialize)]
    enum Shape {
        Point,
        Circle(f64),
        Line(i32, i32),
        Rect { w: u8, h: u8 },
    }

    #[test]
    fn scalars() {
        assert_eq!(enc(&true), "true");
        assert_eq!(enc(&-12i8), "-12");
        assert_eq!(enc(&u64::MAX), "18446744073709551615");
        assert_eq!(enc(&1.5f64), "1.5");
        assert_eq!(enc(&'x'), "\"x\"");
        assert_eq!(enc(&()), "null");
        assert_eq!(enc(&Option::<u8>::None), "null");
        assert_eq!(enc(&Some(3u8)), "3");
    }

    #[test]
    fn string_escapes() {
        assert_eq!(enc("a\"b\\c\nd\u{1}"), r#""a\"b\\c\nd\u0001""#);
        assert_eq!(enc("héllo"), "\"héllo\"");
    }

    #[test]
    fn struct_keeps_field_order() {
        let e = Employee {
            user: "olivere".to_string(),
            city: "santafe".to_string(),
            age: 56,
        };
        assert_eq!(enc(&e), r#"{"user":"olivere","city":"santafe","age":56}"#);
    }

    #[test]
    fn flattened_struct_is_sorted() {
        #[derive(Serialize)]
        struct Inner {
            z: u8,
            a: u8,
        }
        #[derive(Serialize)]
        struct Outer {
            user: u8,
            #[serde(flatten)]
            inner: Inner,
        }
        let v = Outer {
            user: 1,
            inner: Inner { z: 2, a: 3 },
        };
        assert_eq!(enc(&v), r#"{"a":3,"user":1,"z":2}"#);
    }

    #[test]
    fn markup_characters_kept() {
        assert_eq!(enc("a<b>&c"), r#""a<b>&c""#);
    }

    #[test]
    fn map_keys_sorted() {
        let mut map = HashMap::new();
        map.insert("zeta", 1);
        map.insert("_id", 2);
        map.insert("alpha", 3);
        map.insert("Beta", 4);
        map.insert("_index", 5);
        assert_eq!(
            enc(&map),
            r#"{"Beta":4,"_id":2,"_index":5,"alpha":3,"zeta":1}"#
        );
    }

    #[test]
    fn nested_map_keys_sorted() {
        let mut inner = HashMap::new();
        inner.insert("b", vec![1, 2]);
        inner.insert("a", vec![]);
        let mut outer = HashMap::new();
        outer.insert("y", inner.clone());
        outer.insert("x", inner);
        assert_eq!(
            enc(&outer),
            r#"{"x":{"a":[],"b":[1,2]},"y":{"a":[],"b":[1,2]}}"#
        );
    }

    #[test]
    fn json_value_objects_sorted() {
        let v = serde_json::json!({"b": {"d": 1, "c": [true, null]}, "a": "s"});
        assert_eq!(enc(&v), r#"{"a":"s","b":{"c":[true,null],"d":1}}"#);
    }

    #[test]
    fn integer_keys() {
        let mut map = BTreeMap::new();
        map.insert(10u32, "ten");
        map.insert(2u32, "two");
        // Sorted as strings, not numbers
        assert_eq!(enc(&map), r#"{"10":"ten","2":"two"}"#);
    }

    #[test]
    fn bad_key() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1);
        match to_json_string(&map, crate::MAX_DEPTH) {
            Err(Error::SerdeFail(msg)) => assert!(msg.contains("map key must be a string")),
            other => panic!("expected key failure, got {:?}", other),
        }
    }

    #[test]
    fn enums() {
        assert_eq!(enc(&Shape::Point), r#""Point""#);
        assert_eq!(enc(&Shape::Circle(0.5)), r#"{"Circle":0.5}"#);
        assert_eq!(enc(&Shape::Line(1, -1)), r#"{"Line":[1,-1]}"#);
        assert_eq!(enc(&Shape::Rect { w: 2, h: 3 }), r#"{"Rect":{"w":2,"h":3}}"#);
        assert_eq!(
            enc(&vec![Shape::Point, Shape::Line(0, 0)]),
            r#"["Point",{"Line":[0,0]}]"#
        );
    }

    #[test]
    fn bytes_as_base64() {
        #[derive(Serialize)]
        struct Blob {
            #[serde(with = "serde_bytes")]
            data: Vec<u8>,
        }
        let blob = Blob {
            data: vec![0, 1, 2, 3, 255],
        };
        assert_eq!(enc(&blob), r#"{"data":"AAECA/8="}"#);
    }

    #[test]
    fn non_finite_floats_fail() {
        assert!(matches!(
            to_json_string(&f64::NAN, crate::MAX_DEPTH),
            Err(Error::UnsupportedValue(_))
        ));
        assert!(matches!(
            to_json_string(&vec![1.0f32, f32::INFINITY], crate::MAX_DEPTH),
            Err(Error::UnsupportedValue(_))
        ));
    }

    #[test]
    fn depth_limit() {
        let v = vec![vec![vec![1u8]]];
        assert_eq!(to_json_string(&v, 3).unwrap(), "[[[1]]]");
        assert!(matches!(to_json_string(&v, 2), Err(Error::ParseLimit(_))));
    }

    #[test]
    fn runaway_recursion_is_stopped() {
        struct Endless;
        impl Serialize for Endless {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(&Endless)?;
                seq.end()
            }
        }
        assert!(matches!(
            to_json_string(&Endless, 64),
            Err(Error::ParseLimit(_))
        ));
    }

    #[test]
    fn custom_error_passes_through() {
        struct Broken;
        impl Serialize for Broken {
            fn serialize<S: Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
                Err(<S::Error as serde::ser::Error>::custom(
                    "cannot serialize this",
                ))
            }
        }
        assert_eq!(
            to_json_string(&Broken, crate::MAX_DEPTH),
            Err(Error::SerdeFail("cannot serialize this".to_string()))
        );
    }
}
