//! Entry form: seeds every block's widgets from today's record and turns a
//! block submission back into field updates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::errors::AppError;
use crate::fields::spec::{SLIDER_DEFAULT_MAX, SLIDER_DEFAULT_MIN};
use crate::fields::{
    coerce_initial, coerce_submission, Block, CoercionError, FieldKind, FieldSpec, NumberSubtype,
    TypedValue,
};
use crate::store::{FieldUpdates, Record};

/// Stands in for the value of a field submitted as "not measured".
static NOT_MEASURED: Value = Value::Null;

#[derive(Debug, Serialize)]
pub struct EntryForm {
    pub date: NaiveDate,
    pub title: String,
    pub font_size: u32,
    pub blocks: Vec<BlockForm>,
}

#[derive(Debug, Serialize)]
pub struct BlockForm {
    pub id: String,
    pub title: String,
    pub expanded: bool,
    pub save_label: String,
    pub n_cols: usize,
    pub fields: Vec<FieldWidget>,
}

#[derive(Debug, Serialize)]
pub struct FieldWidget {
    /// Unique across the whole form: `<block>__<field>`.
    pub key: String,
    pub name: String,
    pub label: String,
    pub column: usize,
    #[serde(flatten)]
    pub widget: Widget,
}

/// What the client should draw, with the value it starts from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum Widget {
    NumberInput {
        value: TypedValue,
        subtype: NumberSubtype,
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
        allow_none: bool,
        /// Initial state of the "not measured" toggle.
        not_measured: bool,
    },
    Checkbox {
        value: bool,
    },
    Selectbox {
        options: Vec<String>,
        index: usize,
    },
    Slider {
        min: i64,
        max: i64,
        value: i64,
    },
    TextInput {
        value: String,
    },
    TextArea {
        value: String,
        max_chars: Option<usize>,
    },
    TimeInput {
        value: String,
    },
}

pub fn build_entry_form(
    config: &Config,
    date: NaiveDate,
    today: Option<&Record>,
) -> Result<EntryForm, CoercionError> {
    let blocks = config
        .registry
        .blocks()
        .iter()
        .map(|block| render_block(block, today))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EntryForm {
        date,
        title: config.app.title.clone(),
        font_size: config.app.font_size,
        blocks,
    })
}

fn render_block(block: &Block, today: Option<&Record>) -> Result<BlockForm, CoercionError> {
    let fields = block
        .fields
        .iter()
        .map(|field| render_field(block, field, today))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BlockForm {
        id: block.id.clone(),
        title: block.title.clone(),
        expanded: block.expanded,
        save_label: block.save_label.clone(),
        n_cols: block.n_cols,
        fields,
    })
}

pub fn render_field(
    block: &Block,
    field: &FieldSpec,
    today: Option<&Record>,
) -> Result<FieldWidget, CoercionError> {
    let stored = today.and_then(|r| r.get(&field.name));
    let initial = coerce_initial(field, stored)?;

    let widget = match &field.kind {
        FieldKind::Number {
            subtype,
            min,
            max,
            step,
            allow_none,
        } => {
            let not_measured = *allow_none && initial.is_none();
            let value = initial.unwrap_or(match subtype {
                NumberSubtype::Int => TypedValue::Int(min.map_or(0, |m| m as i64)),
                NumberSubtype::Float => TypedValue::Float(min.unwrap_or(0.0)),
            });
            Widget::NumberInput {
                value,
                subtype: *subtype,
                min: *min,
                max: *max,
                step: *step,
                allow_none: *allow_none,
                not_measured,
            }
        }
        FieldKind::Checkbox => Widget::Checkbox {
            value: matches!(initial, Some(TypedValue::Bool(true))),
        },
        FieldKind::Select { options } => {
            let current = text_of(initial);
            Widget::Selectbox {
                options: options.clone(),
                index: options.iter().position(|o| *o == current).unwrap_or(0),
            }
        }
        FieldKind::Slider { min, max } => {
            let min = min.unwrap_or(SLIDER_DEFAULT_MIN);
            Widget::Slider {
                min,
                max: max.unwrap_or(SLIDER_DEFAULT_MAX),
                value: match initial {
                    Some(TypedValue::Int(i)) => i,
                    _ => min,
                },
            }
        }
        FieldKind::Textarea { max_chars } => Widget::TextArea {
            value: text_of(initial),
            max_chars: *max_chars,
        },
        FieldKind::Time => Widget::TimeInput {
            value: text_of(initial),
        },
        FieldKind::Text | FieldKind::Other => Widget::TextInput {
            value: text_of(initial),
        },
    };

    Ok(FieldWidget {
        key: format!("{}__{}", block.id, field.name),
        name: field.name.clone(),
        label: field.label.clone(),
        column: block.column_of(field),
        widget,
    })
}

fn text_of(value: Option<TypedValue>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One block's save request.
#[derive(Debug, Default, Deserialize)]
pub struct BlockSubmission {
    #[serde(default)]
    pub values: Map<String, Value>,
    /// Fields whose "not measured" toggle is on.
    #[serde(default)]
    pub not_measured: Vec<String>,
}

/// Coerces a submission into updates in block order.
///
/// A field flagged "not measured" is written as an explicit blank, clearing any
/// value saved earlier that day. Fields the client did not send are left alone.
pub fn collect_submission(
    block: &Block,
    submission: &BlockSubmission,
) -> Result<FieldUpdates, AppError> {
    let unknown = submission
        .values
        .keys()
        .chain(submission.not_measured.iter())
        .find(|name| block.field(name).is_none());
    if let Some(name) = unknown {
        return Err(AppError::Validation(format!(
            "Block '{}' has no field '{name}'",
            block.id
        )));
    }

    let mut updates = FieldUpdates::new();
    for field in &block.fields {
        let flagged = field.allows_none() && submission.not_measured.contains(&field.name);
        let value = match submission.values.get(&field.name) {
            Some(value) => value,
            None if flagged => &NOT_MEASURED,
            None => continue,
        };
        updates.push((field.name.clone(), coerce_submission(field, value, flagged)?));
    }
    Ok(updates)
}
