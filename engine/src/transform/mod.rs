//! The morph action model and [`LazyTransformer`], which applies an immutable
//! ordered action stack over any [`TableSource`] without touching the
//! underlying data.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumString};
use tracing::debug;

use crate::filter::FilterRowIndexer;
use crate::schema::{parse_timestamp, ColumnType, TableSchema};
use crate::table::TableSource;
use crate::{Error, MorphResult};

pub(crate) mod predicate;

#[cfg(test)]
mod tests;

/// Rendered when a cast cannot parse the raw value.
pub const INVALID_CELL: &str = "<invalid>";

/// Comparison operators a filter action can carry. String predicates are
/// ordinal case-insensitive; order operators on a `Text` column degrade to
/// equality (`Gt`/`Ge` behave as `Eq`, `Lt`/`Le` as `Ne`) so a filter on a
/// mistyped column does not silently drop every row.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    EnumString,
    StrumDisplay,
    AsRefStr,
)]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
}

/// One reversible transformation. Actions referring to a column that no
/// longer exists are silent no-ops when applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MorphAction {
    Rename {
        old_name: String,
        new_name: String,
    },
    Delete {
        column_name: String,
    },
    Cast {
        column_name: String,
        target_type: ColumnType,
    },
    Filter {
        column_name: String,
        operator: FilterOperator,
        value: String,
    },
}

/// An ordered, immutable sequence of actions. Appending builds a new stack;
/// existing holders never observe the change.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionStack(Arc<[MorphAction]>);

impl Default for ActionStack {
    fn default() -> Self {
        Self(Vec::new().into())
    }
}

impl ActionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new stack with `action` appended; `self` is untouched.
    pub fn push(&self, action: MorphAction) -> Self {
        let mut actions: Vec<MorphAction> = self.0.to_vec();
        actions.push(action);
        Self(actions.into())
    }

    pub fn actions(&self) -> &[MorphAction] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MorphAction> {
        self.0.iter()
    }
}

impl FromIterator<MorphAction> for ActionStack {
    fn from_iter<I: IntoIterator<Item = MorphAction>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A filter action resolved against the schema at transformer construction:
/// the raw-source column it reads, and the column type that picks the
/// comparison semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub source_column_index: usize,
    pub column_type: ColumnType,
    pub operator: FilterOperator,
    pub value: String,
}

/// One output column of a transformer: where it reads from and how casts
/// changed its rendering.
#[derive(Debug, Clone)]
struct OutputColumn {
    source_index: usize,
    name: String,
    cast_target: Option<ColumnType>,
    display_format: Option<String>,
}

/// Applies an action stack over an underlying source. Construction folds the
/// actions over the original column list once; per-cell work is a source
/// lookup plus an optional cast rendering. With filters present, visible row
/// numbers are routed through a [`FilterRowIndexer`].
pub struct LazyTransformer {
    source: Box<dyn TableSource>,
    outputs: Vec<OutputColumn>,
    names: Vec<String>,
    filter_specs: Vec<FilterSpec>,
    filter_index: Option<Arc<FilterRowIndexer>>,
}

impl LazyTransformer {
    /// `schema` must describe `source`'s columns; actions are applied in
    /// stack order. Actions naming a column absent at their point in the
    /// stack are skipped.
    pub fn new(source: Box<dyn TableSource>, schema: &TableSchema, actions: &ActionStack) -> Self {
        let mut working: Vec<(OutputColumn, ColumnType)> = schema
            .columns()
            .iter()
            .map(|column| {
                (
                    OutputColumn {
                        source_index: column.column_index(),
                        name: column.name().to_string(),
                        cast_target: None,
                        display_format: column.display_format().map(str::to_string),
                    },
                    column.column_type(),
                )
            })
            .collect();
        let mut filter_specs = Vec::new();

        for action in actions.iter() {
            match action {
                MorphAction::Rename { old_name, new_name } => {
                    if let Some((output, _)) =
                        working.iter_mut().find(|(o, _)| o.name == *old_name)
                    {
                        output.name = new_name.clone();
                    }
                }
                MorphAction::Delete { column_name } => {
                    if let Some(at) = working.iter().position(|(o, _)| o.name == *column_name) {
                        working.remove(at);
                    }
                }
                MorphAction::Cast {
                    column_name,
                    target_type,
                } => {
                    if let Some((output, current)) =
                        working.iter_mut().find(|(o, _)| o.name == *column_name)
                    {
                        output.cast_target = Some(*target_type);
                        *current = *target_type;
                    }
                }
                MorphAction::Filter {
                    column_name,
                    operator,
                    value,
                } => {
                    if let Some((output, current)) =
                        working.iter().find(|(o, _)| o.name == *column_name)
                    {
                        filter_specs.push(FilterSpec {
                            source_column_index: output.source_index,
                            column_type: *current,
                            operator: *operator,
                            value: value.clone(),
                        });
                    }
                }
            }
        }

        let outputs: Vec<OutputColumn> = working.into_iter().map(|(o, _)| o).collect();
        let names = outputs.iter().map(|o| o.name.clone()).collect();
        debug!(
            columns = outputs.len(),
            filters = filter_specs.len(),
            "built transformer"
        );
        Self {
            source,
            outputs,
            names,
            filter_specs,
            filter_index: None,
        }
    }

    /// The filter predicates derived from the stack, in stack order. A row is
    /// visible iff every one of them matches.
    pub fn filter_specs(&self) -> &[FilterSpec] {
        &self.filter_specs
    }

    pub fn has_filters(&self) -> bool {
        !self.filter_specs.is_empty()
    }

    /// Route visible row numbers through `index`. Until attached (or while
    /// the build is behind), filtered cells read as empty.
    pub fn attach_filter_index(&mut self, index: Arc<FilterRowIndexer>) {
        self.filter_index = Some(index);
    }

    /// Map a visible row to its raw-source row, honoring any filter index.
    fn source_row(&self, row: u64) -> Option<u64> {
        if self.filter_specs.is_empty() {
            return Some(row);
        }
        self.filter_index.as_ref()?.get_source_row(row)
    }
}

impl TableSource for LazyTransformer {
    fn rows(&self) -> u64 {
        match (&self.filter_index, self.filter_specs.is_empty()) {
            (_, true) => self.source.rows(),
            (Some(index), false) => index.total_matched_rows(),
            (None, false) => 0,
        }
    }

    fn columns(&self) -> usize {
        self.outputs.len()
    }

    fn column_names(&self) -> &[String] {
        &self.names
    }

    fn cell(&mut self, row: u64, col: usize) -> MorphResult<String> {
        let Some(output) = self.outputs.get(col) else {
            return Err(Error::CellOutOfRange { row, col });
        };
        if row >= self.rows() {
            return Err(Error::CellOutOfRange { row, col });
        }
        let Some(source_row) = self.source_row(row) else {
            // not materialized yet
            return Ok(String::new());
        };
        let raw = self.source.cell(source_row, output.source_index)?;
        Ok(match output.cast_target {
            None => raw,
            Some(target) => render_cast(&raw, target, output.display_format.as_deref()),
        })
    }
}

/// Canonical rendering of a raw value under a cast target. Unparseable input
/// renders as [`INVALID_CELL`].
fn render_cast(raw: &str, target: ColumnType, display_format: Option<&str>) -> String {
    let trimmed = raw.trim();
    match target {
        ColumnType::Text | ColumnType::JsonObject | ColumnType::JsonArray => raw.to_string(),
        ColumnType::WholeNumber => match trimmed.parse::<i64>() {
            Ok(value) => value.to_string(),
            Err(_) => INVALID_CELL.to_string(),
        },
        ColumnType::FloatingPoint => match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => value.to_string(),
            _ => INVALID_CELL.to_string(),
        },
        ColumnType::Boolean => {
            if trimmed.eq_ignore_ascii_case("true") {
                "True".to_string()
            } else if trimmed.eq_ignore_ascii_case("false") {
                "False".to_string()
            } else {
                INVALID_CELL.to_string()
            }
        }
        ColumnType::Timestamp => match parse_timestamp(trimmed) {
            Some(timestamp) => {
                let format = display_format.unwrap_or("%Y-%m-%dT%H:%M:%S");
                timestamp.format(format).to_string()
            }
            None => INVALID_CELL.to_string(),
        },
    }
}
