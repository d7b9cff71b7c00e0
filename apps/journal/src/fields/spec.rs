use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fields::value::RawValue;
use crate::store::{DATE_COLUMN, TIMESTAMP_COLUMN};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberSubtype {
    Int,
    #[default]
    Float,
}

/// The closed set of input types. Per-type constraints travel with the variant.
///
/// Unrecognised `type` strings land in `Other`: their values pass through
/// untouched and they render as plain text inputs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Number {
        #[serde(default)]
        subtype: NumberSubtype,
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
        #[serde(default)]
        allow_none: bool,
    },
    Checkbox,
    Select {
        #[serde(default)]
        options: Vec<String>,
    },
    Slider {
        min: Option<i64>,
        max: Option<i64>,
    },
    Text,
    Textarea {
        max_chars: Option<usize>,
    },
    Time,
    #[serde(other)]
    Other,
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Number { .. } => "number",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Select { .. } => "select",
            FieldKind::Slider { .. } => "slider",
            FieldKind::Text => "text",
            FieldKind::Textarea { .. } => "textarea",
            FieldKind::Time => "time",
            FieldKind::Other => "other",
        }
    }
}

pub const SLIDER_DEFAULT_MIN: i64 = 0;
pub const SLIDER_DEFAULT_MAX: i64 = 10;

/// One input as declared in the configuration document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub default: Option<RawValue>,
    /// Layout column; clamped into the block's column count when rendered.
    #[serde(default)]
    pub col: usize,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Whether the field offers a "not measured" toggle.
    pub fn allows_none(&self) -> bool {
        matches!(self.kind, FieldKind::Number { allow_none: true, .. })
    }
}

/// A group of fields rendered and saved together.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Block {
    pub id: String,
    pub title: String,
    #[serde(default = "default_expanded")]
    pub expanded: bool,
    #[serde(default = "default_save_label")]
    pub save_label: String,
    #[serde(default = "default_n_cols")]
    pub n_cols: usize,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

fn default_expanded() -> bool {
    true
}

fn default_save_label() -> String {
    "Save".to_string()
}

fn default_n_cols() -> usize {
    1
}

impl Block {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn column_of(&self, field: &FieldSpec) -> usize {
        field.col.min(self.n_cols.saturating_sub(1))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("block '{0}' is declared more than once")]
    DuplicateBlock(String),

    #[error("block '{block}' declares field '{field}' more than once")]
    DuplicateField { block: String, field: String },

    #[error("block '{block}' uses reserved column name '{field}' as a field")]
    ReservedName { block: String, field: String },

    #[error("block '{0}' must have at least one column")]
    NoColumns(String),
}

/// Ordered, validated blocks. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Registry {
    blocks: Vec<Block>,
}

impl Registry {
    pub fn new(blocks: Vec<Block>) -> Result<Self, RegistryError> {
        let mut block_ids = HashSet::new();
        for block in &blocks {
            if !block_ids.insert(block.id.as_str()) {
                return Err(RegistryError::DuplicateBlock(block.id.clone()));
            }
            if block.n_cols == 0 {
                return Err(RegistryError::NoColumns(block.id.clone()));
            }

            let mut names = HashSet::new();
            for field in &block.fields {
                if field.name == DATE_COLUMN || field.name == TIMESTAMP_COLUMN {
                    return Err(RegistryError::ReservedName {
                        block: block.id.clone(),
                        field: field.name.clone(),
                    });
                }
                if !names.insert(field.name.as_str()) {
                    return Err(RegistryError::DuplicateField {
                        block: block.id.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }
        Ok(Self { blocks })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn field_count(&self) -> usize {
        self.blocks.iter().map(|b| b.fields.len()).sum()
    }
}
