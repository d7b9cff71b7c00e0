//! Conversion between stored cells and the typed values input controls work with.
//!
//! `coerce_initial` runs on stored data and degrades gracefully for the advisory
//! types (number, time). Sliders and selects are configuration-guaranteed, so a
//! malformed slider value is reported. `coerce_submission` runs on what the
//! client sends back and rejects anything its widget could not have produced.

use chrono::{Local, NaiveTime, Timelike};
use serde_json::Value;
use thiserror::Error;

use crate::fields::spec::{
    FieldKind, FieldSpec, NumberSubtype, SLIDER_DEFAULT_MAX, SLIDER_DEFAULT_MIN,
};
use crate::fields::value::{RawValue, TypedValue};

/// Strings a number field treats as "no value".
const EMPTY_MARKERS: &[&str] = &["", "none", "nan"];

const TIME_FORMAT: &str = "%H:%M:%S";
const SHORT_TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Error, PartialEq)]
pub enum CoercionError {
    #[error("field '{field}': cannot use {value} as a slider position")]
    SliderValue { field: String, value: String },

    #[error("field '{field}': expected {expected}, got {got}")]
    WrongType {
        field: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("field '{field}': {value} is outside {min}..={max}")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("field '{field}': '{value}' is not one of the configured options")]
    UnknownOption { field: String, value: String },

    #[error("field '{field}': {len} characters exceeds the limit of {max}")]
    TooLong { field: String, len: usize, max: usize },

    #[error("field '{field}': '{value}' is not a time of day")]
    InvalidTime { field: String, value: String },
}

/// Produces the value to seed an input control with, from the stored cell
/// (or the field default when nothing is stored).
pub fn coerce_initial(
    field: &FieldSpec,
    stored: Option<&RawValue>,
) -> Result<Option<TypedValue>, CoercionError> {
    let effective = stored.or(field.default.as_ref());

    let value = match &field.kind {
        FieldKind::Number { subtype, .. } => return Ok(initial_number(*subtype, effective)),
        FieldKind::Checkbox => TypedValue::Bool(effective.is_some_and(RawValue::truthy)),
        FieldKind::Select { options } => TypedValue::Text(initial_choice(options, effective)),
        FieldKind::Slider { .. } => TypedValue::Int(slider_position(field, effective)?),
        FieldKind::Text | FieldKind::Textarea { .. } => {
            TypedValue::Text(effective.map(ToString::to_string).unwrap_or_default())
        }
        FieldKind::Time => TypedValue::Time(initial_time(effective)),
        FieldKind::Other => return Ok(effective.cloned().map(TypedValue::Raw)),
    };
    Ok(Some(value))
}

fn initial_number(subtype: NumberSubtype, value: Option<&RawValue>) -> Option<TypedValue> {
    let value = value?;
    if let RawValue::Text(s) = value {
        let marker = s.trim().to_lowercase();
        if EMPTY_MARKERS.contains(&marker.as_str()) {
            return None;
        }
    }
    match subtype {
        NumberSubtype::Int => int_of(value).map(TypedValue::Int),
        NumberSubtype::Float => float_of(value).map(TypedValue::Float),
    }
}

fn int_of(value: &RawValue) -> Option<i64> {
    match value {
        RawValue::Bool(b) => Some(i64::from(*b)),
        RawValue::Int(i) => Some(*i),
        RawValue::Float(f) if f.is_finite() => Some(f.trunc() as i64),
        RawValue::Float(_) => None,
        RawValue::Text(s) => s.trim().parse().ok(),
    }
}

fn float_of(value: &RawValue) -> Option<f64> {
    let parsed = match value {
        RawValue::Bool(b) => f64::from(u8::from(*b)),
        RawValue::Int(i) => *i as f64,
        RawValue::Float(f) => *f,
        RawValue::Text(s) => s.trim().parse().ok()?,
    };
    parsed.is_finite().then_some(parsed)
}

// `as` saturates, so anything outside the i64 range is rejected instead.
fn integral_i64(f: f64) -> Option<i64> {
    let in_range = (i64::MIN as f64..i64::MAX as f64).contains(&f);
    (in_range && f.fract() == 0.0).then_some(f as i64)
}

fn initial_choice(options: &[String], value: Option<&RawValue>) -> String {
    if let Some(current) = value.map(ToString::to_string) {
        if options.contains(&current) {
            return current;
        }
    }
    options.first().cloned().unwrap_or_default()
}

fn slider_position(field: &FieldSpec, value: Option<&RawValue>) -> Result<i64, CoercionError> {
    let Some(value) = value else {
        return Err(CoercionError::SliderValue {
            field: field.name.clone(),
            value: "nothing".to_string(),
        });
    };
    int_of(value).ok_or_else(|| CoercionError::SliderValue {
        field: field.name.clone(),
        value: format!("'{value}'"),
    })
}

fn initial_time(value: Option<&RawValue>) -> NaiveTime {
    match value {
        Some(RawValue::Text(s)) if s != "now" => NaiveTime::parse_from_str(s, TIME_FORMAT)
            .unwrap_or_else(|_| current_time()),
        _ => current_time(),
    }
}

fn current_time() -> NaiveTime {
    let now = Local::now().time();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Converts a submitted widget value into the cell to store.
///
/// `not_measured` only has an effect on number fields declared with
/// `allow_none`; for those it wins over whatever number was submitted.
pub fn coerce_submission(
    field: &FieldSpec,
    submitted: &Value,
    not_measured: bool,
) -> Result<Option<RawValue>, CoercionError> {
    let wrong_type = |expected: &'static str| CoercionError::WrongType {
        field: field.name.clone(),
        expected,
        got: json_kind(submitted),
    };

    match &field.kind {
        FieldKind::Number {
            subtype,
            allow_none,
            ..
        } => {
            if *allow_none && not_measured {
                return Ok(None);
            }
            match (subtype, submitted) {
                (_, Value::Null) => Ok(None),
                (NumberSubtype::Int, Value::Number(n)) => n
                    .as_i64()
                    .or_else(|| n.as_f64().and_then(integral_i64))
                    .map(|i| Some(RawValue::Int(i)))
                    .ok_or_else(|| wrong_type("an integer")),
                (NumberSubtype::Float, Value::Number(n)) => n
                    .as_f64()
                    .map(|f| Some(RawValue::Float(f)))
                    .ok_or_else(|| wrong_type("a number")),
                (NumberSubtype::Int, _) => Err(wrong_type("an integer")),
                (NumberSubtype::Float, _) => Err(wrong_type("a number")),
            }
        }
        FieldKind::Checkbox => submitted
            .as_bool()
            .map(|b| Some(RawValue::Bool(b)))
            .ok_or_else(|| wrong_type("a boolean")),
        FieldKind::Select { options } => {
            let choice = submitted.as_str().ok_or_else(|| wrong_type("a string"))?;
            if options.iter().any(|o| o == choice) {
                Ok(Some(RawValue::Text(choice.to_string())))
            } else {
                Err(CoercionError::UnknownOption {
                    field: field.name.clone(),
                    value: choice.to_string(),
                })
            }
        }
        FieldKind::Slider { min, max } => {
            let position = submitted.as_i64().ok_or_else(|| wrong_type("an integer"))?;
            let min = min.unwrap_or(SLIDER_DEFAULT_MIN);
            let max = max.unwrap_or(SLIDER_DEFAULT_MAX);
            if !(min..=max).contains(&position) {
                return Err(CoercionError::OutOfRange {
                    field: field.name.clone(),
                    value: position,
                    min,
                    max,
                });
            }
            Ok(Some(RawValue::Int(position)))
        }
        FieldKind::Text => submitted
            .as_str()
            .map(|s| Some(RawValue::Text(s.to_string())))
            .ok_or_else(|| wrong_type("a string")),
        FieldKind::Textarea { max_chars } => {
            let text = submitted.as_str().ok_or_else(|| wrong_type("a string"))?;
            let len = text.chars().count();
            match max_chars {
                Some(max) if len > *max => Err(CoercionError::TooLong {
                    field: field.name.clone(),
                    len,
                    max: *max,
                }),
                _ => Ok(Some(RawValue::Text(text.to_string()))),
            }
        }
        FieldKind::Time => {
            let text = submitted.as_str().ok_or_else(|| wrong_type("a time string"))?;
            NaiveTime::parse_from_str(text, TIME_FORMAT)
                .or_else(|_| NaiveTime::parse_from_str(text, SHORT_TIME_FORMAT))
                .map(|t| Some(RawValue::Text(t.format(TIME_FORMAT).to_string())))
                .map_err(|_| CoercionError::InvalidTime {
                    field: field.name.clone(),
                    value: text.to_string(),
                })
        }
        FieldKind::Other => match submitted {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(RawValue::Bool(*b))),
            Value::Number(n) => Ok(n
                .as_i64()
                .map(RawValue::Int)
                .or_else(|| n.as_f64().map(RawValue::Float))),
            Value::String(s) => Ok(Some(RawValue::Text(s.clone()))),
            Value::Array(_) | Value::Object(_) => Err(wrong_type("a scalar")),
        },
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn field(yaml: &str) -> FieldSpec {
        serde_yaml::from_str(yaml).expect("field should parse")
    }

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn test_number_parses_per_subtype() {
        let float = field("{ name: w, label: W, type: number }");
        let int = field("{ name: s, label: S, type: number, subtype: int }");

        assert_eq!(
            coerce_initial(&float, Some(&RawValue::Int(7))),
            Ok(Some(TypedValue::Float(7.0)))
        );
        assert_eq!(
            coerce_initial(&int, Some(&RawValue::Float(8500.0))),
            Ok(Some(TypedValue::Int(8500)))
        );
        assert_eq!(
            coerce_initial(&float, Some(&text(" 6.25 "))),
            Ok(Some(TypedValue::Float(6.25)))
        );
    }

    #[test]
    fn test_number_empty_markers_and_garbage_become_null() {
        let f = field("{ name: w, label: W, type: number, subtype: int }");
        for raw in ["", "  ", "None", "NaN", " nan "] {
            assert_eq!(coerce_initial(&f, Some(&text(raw))), Ok(None), "{raw:?}");
        }
        assert_eq!(coerce_initial(&f, Some(&text("7.5"))), Ok(None));
        assert_eq!(coerce_initial(&f, Some(&text("lots"))), Ok(None));
        assert_eq!(coerce_initial(&f, None), Ok(None));
    }

    #[test]
    fn test_number_falls_back_to_default() {
        let f = field("{ name: w, label: W, type: number, default: 70.5 }");
        assert_eq!(coerce_initial(&f, None), Ok(Some(TypedValue::Float(70.5))));
        assert_eq!(
            coerce_initial(&f, Some(&RawValue::Float(71.0))),
            Ok(Some(TypedValue::Float(71.0)))
        );
    }

    #[test]
    fn test_checkbox_truthiness() {
        let f = field("{ name: gym, label: Gym, type: checkbox }");
        assert_eq!(coerce_initial(&f, None), Ok(Some(TypedValue::Bool(false))));
        assert_eq!(
            coerce_initial(&f, Some(&RawValue::Bool(true))),
            Ok(Some(TypedValue::Bool(true)))
        );
        assert_eq!(
            coerce_initial(&f, Some(&RawValue::Int(0))),
            Ok(Some(TypedValue::Bool(false)))
        );
    }

    #[test]
    fn test_select_member_or_first_option() {
        let f = field("{ name: m, label: M, type: select, options: [low, ok, great] }");
        assert_eq!(
            coerce_initial(&f, Some(&text("great"))),
            Ok(Some(TypedValue::Text("great".into())))
        );
        assert_eq!(
            coerce_initial(&f, Some(&text("ecstatic"))),
            Ok(Some(TypedValue::Text("low".into())))
        );

        let empty = field("{ name: m, label: M, type: select }");
        assert_eq!(
            coerce_initial(&empty, Some(&text("x"))),
            Ok(Some(TypedValue::Text(String::new())))
        );
    }

    #[test]
    fn test_slider_coerces_or_errors() {
        let f = field("{ name: q, label: Q, type: slider, min: 1, max: 5, default: 3 }");
        assert_eq!(coerce_initial(&f, None), Ok(Some(TypedValue::Int(3))));
        assert_eq!(
            coerce_initial(&f, Some(&RawValue::Float(4.0))),
            Ok(Some(TypedValue::Int(4)))
        );
        assert!(matches!(
            coerce_initial(&f, Some(&text("high"))),
            Err(CoercionError::SliderValue { .. })
        ));

        let no_default = field("{ name: q, label: Q, type: slider }");
        assert!(coerce_initial(&no_default, None).is_err());
    }

    #[test]
    fn test_text_and_textarea_stringify() {
        let f = field("{ name: n, label: N, type: textarea, max_chars: 10 }");
        assert_eq!(
            coerce_initial(&f, None),
            Ok(Some(TypedValue::Text(String::new())))
        );
        assert_eq!(
            coerce_initial(&f, Some(&RawValue::Int(42))),
            Ok(Some(TypedValue::Text("42".into())))
        );
    }

    #[test]
    fn test_time_parses_or_uses_now() {
        let f = field("{ name: t, label: T, type: time, default: now }");
        assert_eq!(
            coerce_initial(&f, Some(&text("06:45:00"))),
            Ok(Some(TypedValue::Time(NaiveTime::from_hms_opt(6, 45, 0).unwrap())))
        );

        for stored in [None, Some(text("now")), Some(text("25:99")), Some(RawValue::Int(7))] {
            let before = current_time();
            let Ok(Some(TypedValue::Time(t))) = coerce_initial(&f, stored.as_ref()) else {
                panic!("time fields always produce a time");
            };
            // Tolerate a second boundary (or midnight) between the two reads.
            assert!(t >= before || before.hour() == 23, "{t} < {before}");
        }
    }

    #[test]
    fn test_other_passes_through() {
        let f = field("{ name: x, label: X, type: colour, default: teal }");
        assert_eq!(
            coerce_initial(&f, None),
            Ok(Some(TypedValue::Raw(text("teal"))))
        );
        assert_eq!(
            coerce_initial(&f, Some(&RawValue::Int(3))),
            Ok(Some(TypedValue::Raw(RawValue::Int(3))))
        );
    }

    #[test]
    fn test_advisory_types_never_error_on_garbage() {
        let fields = [
            field("{ name: a, label: A, type: number }"),
            field("{ name: b, label: B, type: time }"),
            field("{ name: c, label: C, type: select, options: [x] }"),
            field("{ name: d, label: D, type: checkbox }"),
            field("{ name: e, label: E, type: text }"),
        ];
        let garbage = [
            None,
            Some(text("")),
            Some(text("???")),
            Some(RawValue::Float(f64::NAN)),
            Some(RawValue::Bool(true)),
        ];
        for f in &fields {
            for g in &garbage {
                assert!(coerce_initial(f, g.as_ref()).is_ok(), "{} / {g:?}", f.name);
            }
        }
    }

    #[test]
    fn test_not_measured_suppresses_number() {
        let f = field("{ name: hrv, label: HRV, type: number, subtype: int, allow_none: true }");
        assert_eq!(coerce_submission(&f, &json!(55), true), Ok(None));
        assert_eq!(coerce_submission(&f, &json!(55), false), Ok(Some(RawValue::Int(55))));

        let strict = field("{ name: w, label: W, type: number }");
        assert_eq!(
            coerce_submission(&strict, &json!(70.5), true),
            Ok(Some(RawValue::Float(70.5)))
        );
    }

    #[test]
    fn test_number_submission_types() {
        let int = field("{ name: s, label: S, type: number, subtype: int }");
        assert_eq!(coerce_submission(&int, &json!(8000.0), false), Ok(Some(RawValue::Int(8000))));
        assert!(coerce_submission(&int, &json!(1.5), false).is_err());
        assert!(coerce_submission(&int, &json!("12"), false).is_err());
        assert_eq!(coerce_submission(&int, &Value::Null, false), Ok(None));
    }

    #[test]
    fn test_int_submission_outside_i64_is_rejected() {
        let int = field("{ name: s, label: S, type: number, subtype: int }");
        for huge in [json!(1e30), json!(-1e30), json!(9.3e18), json!(u64::MAX)] {
            assert!(matches!(
                coerce_submission(&int, &huge, false),
                Err(CoercionError::WrongType { expected: "an integer", .. })
            ));
        }
        assert_eq!(
            coerce_submission(&int, &json!(-9.0e18), false),
            Ok(Some(RawValue::Int(-9_000_000_000_000_000_000)))
        );
    }

    #[test]
    fn test_select_and_slider_submissions_are_checked() {
        let select = field("{ name: m, label: M, type: select, options: [low, ok] }");
        assert_eq!(
            coerce_submission(&select, &json!("ok"), false),
            Ok(Some(text("ok")))
        );
        assert_eq!(
            coerce_submission(&select, &json!("great"), false),
            Err(CoercionError::UnknownOption {
                field: "m".into(),
                value: "great".into()
            })
        );

        let slider = field("{ name: q, label: Q, type: slider, min: 1, max: 5 }");
        assert_eq!(coerce_submission(&slider, &json!(4), false), Ok(Some(RawValue::Int(4))));
        assert!(matches!(
            coerce_submission(&slider, &json!(9), false),
            Err(CoercionError::OutOfRange { value: 9, min: 1, max: 5, .. })
        ));

        let default_range = field("{ name: q, label: Q, type: slider }");
        assert!(coerce_submission(&default_range, &json!(10), false).is_ok());
        assert!(coerce_submission(&default_range, &json!(11), false).is_err());
    }

    #[test]
    fn test_textarea_limit_and_time_normalisation() {
        let notes = field("{ name: n, label: N, type: textarea, max_chars: 5 }");
        assert!(coerce_submission(&notes, &json!("héllo"), false).is_ok());
        assert!(matches!(
            coerce_submission(&notes, &json!("too long"), false),
            Err(CoercionError::TooLong { len: 8, max: 5, .. })
        ));

        let wake = field("{ name: t, label: T, type: time }");
        assert_eq!(
            coerce_submission(&wake, &json!("06:30"), false),
            Ok(Some(text("06:30:00")))
        );
        assert!(matches!(
            coerce_submission(&wake, &json!("later"), false),
            Err(CoercionError::InvalidTime { .. })
        ));
    }

    #[test]
    fn test_checkbox_and_other_submissions() {
        let gym = field("{ name: gym, label: Gym, type: checkbox }");
        assert_eq!(coerce_submission(&gym, &json!(true), false), Ok(Some(RawValue::Bool(true))));
        assert!(coerce_submission(&gym, &json!("yes"), false).is_err());

        let other = field("{ name: x, label: X, type: colour }");
        assert_eq!(coerce_submission(&other, &json!(3), false), Ok(Some(RawValue::Int(3))));
        assert!(coerce_submission(&other, &json!([1, 2]), false).is_err());
    }
}
