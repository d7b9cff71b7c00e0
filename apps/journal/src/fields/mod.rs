// Field registry and value coercion.
// Blocks and fields come from the configuration document and never change at runtime.

pub mod coercion;
pub mod spec;
pub mod value;

pub use coercion::{coerce_initial, coerce_submission, CoercionError};
pub use spec::{Block, FieldKind, FieldSpec, NumberSubtype, Registry};
pub use value::{RawValue, TypedValue};
