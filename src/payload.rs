//! Payloads and the converter that produces them.
//!
//! The engine treats a [`Payload`] as opaque bytes. Only the [`Converter`] knows how
//! values map to bytes; the default [`JsonConverter`] uses `serde_json`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

/// Serialized argument or result. Immutable once produced.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Payload(bytes.into())
    }

    pub fn empty() -> Self {
        Payload(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "Payload({s:?})"),
            Err(_) => write!(f, "Payload({} bytes)", self.0.len()),
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload(bytes)
    }
}

/// Turns values into payloads and back.
pub trait Converter: Send + Sync {
    fn to_payload<T: Serialize + ?Sized>(&self, value: &T) -> Result<Payload, ConversionError>;

    fn from_payload<T: DeserializeOwned>(&self, payload: &Payload) -> Result<T, ConversionError>;

    /// Decode an argument list into a single value.
    ///
    /// No payload decodes like an empty one, a single payload decodes directly,
    /// and several decode as a sequence so a tuple receives every argument in order.
    fn decode_args<T: DeserializeOwned>(&self, args: &[Payload]) -> Result<T, ConversionError>;
}

/// JSON converter backed by `serde_json`. An empty payload decodes as `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

/// Converter used by the activity bridge and typed registrations.
pub type DefaultConverter = JsonConverter;

impl JsonConverter {
    fn to_value(&self, payload: &Payload) -> Result<serde_json::Value, ConversionError> {
        if payload.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(payload.as_bytes()).map_err(|e| ConversionError::decode(e.to_string()))
    }
}

impl Converter for JsonConverter {
    fn to_payload<T: Serialize + ?Sized>(&self, value: &T) -> Result<Payload, ConversionError> {
        serde_json::to_vec(value)
            .map(Payload)
            .map_err(|e| ConversionError::encode(e.to_string()))
    }

    fn from_payload<T: DeserializeOwned>(&self, payload: &Payload) -> Result<T, ConversionError> {
        let value = self.to_value(payload)?;
        serde_json::from_value(value).map_err(|e| ConversionError::decode(e.to_string()))
    }

    fn decode_args<T: DeserializeOwned>(&self, args: &[Payload]) -> Result<T, ConversionError> {
        match args {
            [] => return self.from_payload(&Payload::empty()),
            [single] => return self.from_payload(single),
            _ => {}
        }
        let values = args
            .iter()
            .map(|p| self.to_value(p))
            .collect::<Result<Vec<_>, _>>()?;
        serde_json::from_value(serde_json::Value::Array(values)).map_err(|e| ConversionError::decode(e.to_string()))
    }
}

/// Argument lists accepted by the activity bridge.
///
/// Implemented for `()`, tuples of up to six `Serialize` values, and already
/// converted `Vec<Payload>`.
pub trait IntoPayloads {
    fn into_payloads<Conv: Converter>(self, converter: &Conv) -> Result<Vec<Payload>, ConversionError>;
}

impl IntoPayloads for Vec<Payload> {
    fn into_payloads<Conv: Converter>(self, _converter: &Conv) -> Result<Vec<Payload>, ConversionError> {
        Ok(self)
    }
}

impl IntoPayloads for () {
    fn into_payloads<Conv: Converter>(self, _converter: &Conv) -> Result<Vec<Payload>, ConversionError> {
        Ok(Vec::new())
    }
}

macro_rules! tuple_into_payloads {
    ($($name:ident),+) => {
        impl<$($name: Serialize),+> IntoPayloads for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_payloads<Conv: Converter>(self, converter: &Conv) -> Result<Vec<Payload>, ConversionError> {
                let ($($name,)+) = self;
                Ok(vec![$(converter.to_payload(&$name)?),+])
            }
        }
    };
}

tuple_into_payloads!(A);
tuple_into_payloads!(A, B);
tuple_into_payloads!(A, B, C);
tuple_into_payloads!(A, B, C, D);
tuple_into_payloads!(A, B, C, D, E);
tuple_into_payloads!(A, B, C, D, E, F);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_payload_decodes_as_unit_and_none() {
        let c = JsonConverter;
        let _: () = c.from_payload(&Payload::empty()).unwrap();
        let none: Option<i32> = c.from_payload(&Payload::empty()).unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn decode_args_spreads_over_tuples() {
        let c = JsonConverter;
        let args = (7, "x".to_string()).into_payloads(&c).unwrap();
        assert_eq!(args.len(), 2);
        let (n, s): (i32, String) = c.decode_args(&args).unwrap();
        assert_eq!((n, s.as_str()), (7, "x"));

        let one = (42,).into_payloads(&c).unwrap();
        let v: i32 = c.decode_args(&one).unwrap();
        assert_eq!(v, 42);

        let _: () = c.decode_args(&[]).unwrap();
        let absent: Option<String> = c.decode_args(&[]).unwrap();
        assert!(absent.is_none());
    }

    #[test]
    fn wide_tuples_keep_argument_order() {
        let c = JsonConverter;
        let args = (1, "two", 3.5, true, 'e', vec![6u8]).into_payloads(&c).unwrap();
        assert_eq!(args.len(), 6);
        let decoded: (i32, String, f64, bool, char, Vec<u8>) = c.decode_args(&args).unwrap();
        assert_eq!(decoded, (1, "two".to_string(), 3.5, true, 'e', vec![6u8]));

        let three = ("a", "b", "c").into_payloads(&c).unwrap();
        let (x, y, z): (String, String, String) = c.decode_args(&three).unwrap();
        assert_eq!(format!("{x}{y}{z}"), "abc");
    }

    #[test]
    fn non_string_map_keys_fail_to_encode() {
        let mut m: HashMap<(i32, i32), i32> = HashMap::new();
        m.insert((1, 2), 3);
        let err = (m,).into_payloads(&JsonConverter).unwrap_err();
        assert_eq!(err.direction, crate::error::ConversionDirection::ToPayload);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = JsonConverter.from_payload::<i32>(&Payload::new(b"{oops".to_vec())).unwrap_err();
        assert_eq!(err.direction, crate::error::ConversionDirection::FromPayload);
    }

    #[test]
    fn debug_shows_utf8_content() {
        let p = JsonConverter.to_payload(&"hi").unwrap();
        assert_eq!(format!("{p:?}"), "Payload(\"\\\"hi\\\"\")");
    }
}
