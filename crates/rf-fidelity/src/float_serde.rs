//! Serde adapter for `f64` fields that may hold NaN or an infinity.
//!
//! JSON has no literal for non-finite numbers and `serde_json` would write
//! `null`, so those values travel as the strings `"NaN"`, `"inf"` and `"-inf"`.
//! Finite values stay plain numbers.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else if value.is_nan() {
        serializer.serialize_str("NaN")
    } else if *value > 0.0 {
        serializer.serialize_str("inf")
    } else {
        serializer.serialize_str("-inf")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Repr {
    Number(f64),
    Text(String),
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Repr::deserialize(deserializer)? {
        Repr::Number(v) => Ok(v),
        Repr::Text(text) => match text.as_str() {
            "NaN" => Ok(f64::NAN),
            "inf" => Ok(f64::INFINITY),
            "-inf" => Ok(f64::NEG_INFINITY),
            other => Err(D::Error::custom(format!(
                "expected a number, \"NaN\", \"inf\" or \"-inf\", got {:?}",
                other
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Reading {
        #[serde(with = "super")]
        value: f64,
    }

    fn round_trip(value: f64) -> (String, f64) {
        let json = serde_json::to_string(&Reading { value }).unwrap();
        let back: Reading = serde_json::from_str(&json).unwrap();
        (json, back.value)
    }

    #[test]
    fn test_finite_stays_numeric() {
        let (json, back) = round_trip(0.25);
        assert_eq!(json, r#"{"value":0.25}"#);
        assert_eq!(back, 0.25);
    }

    #[test]
    fn test_non_finite_survives_json() {
        let (json, back) = round_trip(f64::INFINITY);
        assert_eq!(json, r#"{"value":"inf"}"#);
        assert_eq!(back, f64::INFINITY);

        let (json, back) = round_trip(f64::NEG_INFINITY);
        assert_eq!(json, r#"{"value":"-inf"}"#);
        assert_eq!(back, f64::NEG_INFINITY);

        let (json, back) = round_trip(f64::NAN);
        assert_eq!(json, r#"{"value":"NaN"}"#);
        assert!(back.is_nan());
    }

    #[test]
    fn test_unknown_text_rejected() {
        assert!(serde_json::from_str::<Reading>(r#"{"value":"large"}"#).is_err());
        assert!(serde_json::from_str::<Reading>(r#"{"value":null}"#).is_err());
    }
}
