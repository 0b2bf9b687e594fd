//! Canonical value codec.
//!
//! Keys and values handed to the embedded backend are turned into bytes here.
//! The encoding is JSON, normalized through [`serde_json::Value`] first so
//! object members always come out in sorted order: two logically equal
//! values produce byte-identical output, which is what exact-key lookups
//! depend on.
//!
//! The structural form is also what makes `distinct` and bulk filters
//! possible, since stored values stay addressable by field name.

use crate::error::{DbError, Result};
use serde::de::DeserializeOwned;
use serde::{ser, Serialize};
use serde_json::Value;

/// Convert any serializable value into its structural form.
///
/// # Errors
///
/// Returns [`DbError::Encode`] if the value cannot be represented
/// (for example, a map whose keys are not strings, or a NaN/infinite
/// float, which JSON would silently turn into `null`).
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    value
        .serialize(FiniteFloats)
        .map_err(|e| DbError::encode("Value cannot be stored losslessly", Some(e)))?;
    serde_json::to_value(value)
        .map_err(|e| DbError::encode("Failed to convert value to a document", Some(e)))
}

/// Encode a record key.
///
/// # Errors
///
/// Returns [`DbError::Encode`] if the key cannot be serialized, or if it is
/// an empty selector (`null` or `{}`): such a record could never be looked
/// up again, since `find` treats an empty selector as "keep the last key".
pub fn encode_key<K: Serialize + ?Sized>(key: &K) -> Result<Vec<u8>> {
    let value = to_value(key)?;
    if is_empty_selector(&value) {
        return Err(DbError::encode(
            format!("Empty key {value} cannot address a record"),
            None::<serde_json::Error>,
        ));
    }
    encode_value(&value)
}

/// Encode a value into canonical bytes.
///
/// # Errors
///
/// Returns [`DbError::Encode`] if the value cannot be serialized.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    encode_value(&to_value(value)?)
}

/// Encode an already-structural value.
///
/// # Errors
///
/// Returns [`DbError::Encode`] if writing the bytes fails.
pub fn encode_value(value: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| DbError::encode("Failed to encode to bytes", Some(e)))
}

/// Decode bytes into the requested type.
///
/// Zero bytes never decode: an empty stored value is a [`DbError::Decode`],
/// not an absent record.
///
/// # Errors
///
/// Returns [`DbError::Decode`] if the bytes do not match `T`'s shape.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.is_empty() {
        return Err(DbError::decode(
            "Stored value is empty",
            None::<serde_json::Error>,
        ));
    }
    serde_json::from_slice(bytes).map_err(|e| {
        DbError::decode(
            format!("Failed to decode into {}", std::any::type_name::<T>()),
            Some(e),
        )
    })
}

/// Decode bytes into their structural form.
///
/// # Errors
///
/// Returns [`DbError::Decode`] if the bytes are not a valid document.
pub fn decode_value(bytes: &[u8]) -> Result<Value> {
    decode(bytes)
}

/// Convert a structural value into the requested type.
///
/// # Errors
///
/// Returns [`DbError::Decode`] if the value does not match `T`'s shape.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        DbError::decode(
            format!("Failed to decode into {}", std::any::type_name::<T>()),
            Some(e),
        )
    })
}

/// Whether a selector carries no lookup information.
///
/// `null` and `{}` are empty; everything else, including `""` and `[]`, is a
/// real key.
pub fn is_empty_selector(selector: &Value) -> bool {
    match selector {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Look up a dot-separated field path inside a document.
///
/// Array elements are addressed by decimal index (`"tags.0"`).
pub fn field<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Equality filter used by bulk operations.
///
/// An empty filter matches everything. An object filter matches when every
/// `(path, expected)` member equals the document's value at that path. Any
/// other filter must equal the whole document.
pub fn matches(filter: &Value, doc: &Value) -> bool {
    match filter {
        _ if is_empty_selector(filter) => true,
        Value::Object(conditions) => conditions
            .iter()
            .all(|(path, expected)| field(doc, path) == Some(expected)),
        other => other == doc,
    }
}

/// Serializer that stores nothing and fails on the first NaN or infinite
/// float anywhere in the value.
#[derive(Clone, Copy)]
struct FiniteFloats;

type CheckResult = std::result::Result<(), serde_json::Error>;

fn check_float(v: f64) -> CheckResult {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ser::Error::custom(format!(
            "non-finite float {v} has no JSON representation"
        )))
    }
}

macro_rules! accept {
    ($($method:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method(self, _v: $ty) -> CheckResult {
                Ok(())
            }
        )*
    };
}

impl ser::Serializer for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    accept! {
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_i128: i128,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_u128: u128,
        serialize_char: char,
        serialize_str: &str,
        serialize_bytes: &[u8],
    }

    fn serialize_f32(self, v: f32) -> CheckResult {
        check_float(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> CheckResult {
        check_float(v)
    }

    fn serialize_none(self) -> CheckResult {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> CheckResult {
        value.serialize(self)
    }

    fn serialize_unit(self) -> CheckResult {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> CheckResult {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> CheckResult {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> CheckResult {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> CheckResult {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> std::result::Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> std::result::Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> std::result::Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> CheckResult {
        value.serialize(*self)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> CheckResult {
        value.serialize(*self)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> CheckResult {
        value.serialize(*self)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> CheckResult {
        value.serialize(*self)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> CheckResult {
        key.serialize(*self)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> CheckResult {
        value.serialize(*self)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> CheckResult {
        value.serialize(*self)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> CheckResult {
        value.serialize(*self)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}
