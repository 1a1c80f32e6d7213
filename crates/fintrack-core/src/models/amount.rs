//! Money amounts as delivered by Postgres `numeric` columns.
//!
//! PostgREST serializes `numeric` as a JSON number, but the realtime feed and
//! some views hand it over as a string. Both are accepted.

use serde::de::{self, Deserializer, Visitor};
use std::fmt;

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    struct AmountVisitor;

    impl Visitor<'_> for AmountVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a finite number or numeric string")
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<f64, E> {
            if value.is_finite() {
                Ok(value)
            } else {
                Err(E::custom("amount must be finite"))
            }
        }

        #[allow(clippy::cast_precision_loss)]
        fn visit_i64<E: de::Error>(self, value: i64) -> Result<f64, E> {
            Ok(value as f64)
        }

        #[allow(clippy::cast_precision_loss)]
        fn visit_u64<E: de::Error>(self, value: u64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<f64, E> {
            value
                .trim()
                .parse::<f64>()
                .map_err(E::custom)
                .and_then(|parsed| self.visit_f64(parsed))
        }
    }

    deserializer.deserialize_any(AmountVisitor)
}

/// Shared draft check: amounts must be positive and finite.
pub fn validate(amount: f64) -> crate::Result<()> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(crate::Error::Validation(format!(
            "amount must be a positive number, got {amount}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "super::deserialize")]
        amount: f64,
    }

    #[test]
    fn accepts_numbers_and_numeric_strings() {
        let as_number: Row = serde_json::from_str(r#"{"amount": 12.5}"#).unwrap();
        let as_integer: Row = serde_json::from_str(r#"{"amount": 7}"#).unwrap();
        let as_text: Row = serde_json::from_str(r#"{"amount": " 99.25 "}"#).unwrap();
        assert!((as_number.amount - 12.5).abs() < f64::EPSILON);
        assert!((as_integer.amount - 7.0).abs() < f64::EPSILON);
        assert!((as_text.amount - 99.25).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<Row>(r#"{"amount": "ten"}"#).is_err());
        assert!(serde_json::from_str::<Row>(r#"{"amount": null}"#).is_err());
    }

    #[test]
    fn validate_requires_positive_amounts() {
        assert!(super::validate(0.01).is_ok());
        assert!(super::validate(0.0).is_err());
        assert!(super::validate(-5.0).is_err());
        assert!(super::validate(f64::NAN).is_err());
    }
}
