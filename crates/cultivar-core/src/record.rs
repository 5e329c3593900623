//! Record normalization: arbitrary JSON object → fixed-width feature vector.
//!
//! Lookup is by field name, so the input's key order never affects the
//! output order. Extra keys are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::schema::{ARITY, FIELDS};

/// Ordered 13-value numeric representation of one wine sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector([f64; ARITY]);

impl FeatureVector {
    pub fn new(values: [f64; ARITY]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64; ARITY] {
        &self.0
    }

    /// Value of a feature by schema name.
    pub fn get(&self, name: &str) -> Option<f64> {
        crate::schema::position(name).map(|i| self.0[i])
    }
}

impl std::ops::Index<usize> for FeatureVector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

/// Per-record validation failure. Never fatal to sibling records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,

    /// Every absent field, in schema order.
    #[error("missing required field(s): {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("field '{field}' is not a real number: {value}")]
    TypeCoercion { field: &'static str, value: String },
}

impl RecordError {
    /// Stable machine-readable tag used in response documents.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotAnObject => "invalid_record",
            Self::MissingFields(_) => "missing_field",
            Self::TypeCoercion { .. } => "type_coercion",
        }
    }

    /// Field names the error refers to.
    pub fn fields(&self) -> Vec<&'static str> {
        match self {
            Self::NotAnObject => Vec::new(),
            Self::MissingFields(fields) => fields.clone(),
            Self::TypeCoercion { field, .. } => vec![field],
        }
    }
}

/// Normalize one record into schema order.
///
/// Missing fields (absent or `null`) are all reported together and take
/// precedence over coercion failures. Numeric strings are coerced;
/// booleans, containers and non-finite values are rejected.
pub fn normalize(record: &Value) -> Result<FeatureVector, RecordError> {
    let obj = record.as_object().ok_or(RecordError::NotAnObject)?;

    let missing: Vec<&'static str> = FIELDS
        .iter()
        .filter(|f| obj.get(f.name).is_none_or(Value::is_null))
        .map(|f| f.name)
        .collect();
    if !missing.is_empty() {
        return Err(RecordError::MissingFields(missing));
    }

    let mut values = [0.0f64; ARITY];
    for (slot, field) in values.iter_mut().zip(FIELDS.iter()) {
        let raw = &obj[field.name];
        *slot = coerce(raw).ok_or_else(|| RecordError::TypeCoercion {
            field: field.name,
            value: raw.to_string(),
        })?;
    }

    Ok(FeatureVector(values))
}

fn coerce(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// The documented single-input example.
    fn sample() -> Value {
        json!({
            "alcohol": 13.2,
            "malic_acid": 1.78,
            "ash": 2.14,
            "alcalinity_of_ash": 11.2,
            "magnesium": 100.0,
            "total_phenols": 2.65,
            "flavanoids": 2.76,
            "nonflavanoid_phenols": 0.26,
            "proanthocyanins": 1.28,
            "color_intensity": 4.38,
            "hue": 1.05,
            "od280_od315_of_diluted_wines": 3.4,
            "proline": 1510.0
        })
    }

    #[test]
    fn documented_example_in_schema_order() {
        let v = normalize(&sample()).unwrap();
        assert_eq!(v.values().len(), ARITY);
        assert_eq!(v[0], 13.2);
        assert_eq!(v[4], 100.0);
        assert_eq!(v[12], 1510.0);
        assert_eq!(v.get("hue"), Some(1.05));
    }

    #[test]
    fn key_order_is_irrelevant() {
        let forward = sample();
        let mut reversed = serde_json::Map::new();
        for (k, val) in forward.as_object().unwrap().iter().rev() {
            reversed.insert(k.clone(), val.clone());
        }
        assert_eq!(
            normalize(&forward).unwrap(),
            normalize(&Value::Object(reversed)).unwrap()
        );
    }

    #[test]
    fn normalizing_twice_is_identical() {
        let rec = sample();
        assert_eq!(normalize(&rec).unwrap(), normalize(&rec).unwrap());
    }

    #[test]
    fn missing_magnesium_names_only_magnesium() {
        let mut rec = sample();
        rec.as_object_mut().unwrap().remove("magnesium");
        assert_eq!(
            normalize(&rec).unwrap_err(),
            RecordError::MissingFields(vec!["magnesium"])
        );
    }

    #[test]
    fn all_missing_fields_reported_at_once() {
        let err = normalize(&json!({ "alcohol": 13.0 })).unwrap_err();
        match err {
            RecordError::MissingFields(fields) => {
                assert_eq!(fields.len(), ARITY - 1);
                assert_eq!(fields[0], "malic_acid");
                assert!(!fields.contains(&"alcohol"));
            }
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn null_counts_as_missing() {
        let mut rec = sample();
        rec["hue"] = Value::Null;
        assert_eq!(
            normalize(&rec).unwrap_err(),
            RecordError::MissingFields(vec!["hue"])
        );
    }

    #[test]
    fn non_numeric_string_is_type_error() {
        let mut rec = sample();
        rec["alcohol"] = json!("not-a-number");
        let err = normalize(&rec).unwrap_err();
        assert_eq!(err.kind(), "type_coercion");
        assert_eq!(err.fields(), vec!["alcohol"]);
    }

    #[test]
    fn numeric_string_is_coerced() {
        let mut rec = sample();
        rec["proline"] = json!(" 1510 ");
        assert_eq!(normalize(&rec).unwrap()[12], 1510.0);
    }

    #[test]
    fn booleans_and_non_finite_rejected() {
        let mut rec = sample();
        rec["ash"] = json!(true);
        assert!(matches!(
            normalize(&rec),
            Err(RecordError::TypeCoercion { field: "ash", .. })
        ));

        let mut rec = sample();
        rec["ash"] = json!("NaN");
        assert!(matches!(
            normalize(&rec),
            Err(RecordError::TypeCoercion { field: "ash", .. })
        ));
    }

    #[test]
    fn missing_takes_precedence_over_coercion() {
        let mut rec = sample();
        rec["alcohol"] = json!("x");
        rec.as_object_mut().unwrap().remove("proline");
        assert_eq!(
            normalize(&rec).unwrap_err(),
            RecordError::MissingFields(vec!["proline"])
        );
    }

    #[test]
    fn extra_keys_ignored() {
        let mut rec = sample();
        rec["vintage"] = json!(1998);
        assert!(normalize(&rec).is_ok());
    }

    #[test]
    fn non_object_rejected() {
        assert_eq!(normalize(&json!([1, 2])).unwrap_err(), RecordError::NotAnObject);
        assert_eq!(normalize(&json!(3.5)).unwrap_err().kind(), "invalid_record");
    }
}
