use crate::store::Record;

/// Subjective fields where higher is better.
pub const POSITIVE_FIELDS: &[&str] =
    &["motivation", "mental_clarity", "mood_content", "productivity"];

/// Subjective fields where higher is worse; scored as `10 - value`.
pub const INVERTED_FIELDS: &[&str] = &["fatigue", "stress", "overstimulation"];

const SCALE_MAX: f64 = 10.0;

/// Overall "vibe" of a day on a 0-10 scale, rounded to one decimal.
///
/// Returns `None` when any of the seven subjective fields is missing or not a
/// number; callers show no score rather than a partial average.
pub fn subjective_average(record: &Record) -> Option<f64> {
    let value = |name: &str| record.get(name).and_then(|v| v.as_number());

    let mut total = 0.0;
    for name in POSITIVE_FIELDS {
        total += value(name)?;
    }
    for name in INVERTED_FIELDS {
        total += SCALE_MAX - value(name)?;
    }

    let count = (POSITIVE_FIELDS.len() + INVERTED_FIELDS.len()) as f64;
    Some(round_to_tenth(total / count))
}

fn round_to_tenth(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
