// Presentation layer: entry form, per-block save, history and the stats placeholder.
// Owns no data-model logic; everything goes through fields::coercion and the record store.

pub mod form;
pub mod handlers;
pub mod history;
