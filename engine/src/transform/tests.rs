use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::*;
use crate::filter::FilterRowIndexer;
use crate::format::DataFormat;
use crate::reader::FilterCellSource;
use crate::schema::{ColumnSchema, ColumnType, TableSchema};
use crate::table::TableSource;

/// In-memory table used as the underlying source.
#[derive(Clone)]
struct VecSource {
    names: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl VecSource {
    fn new(names: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            names: names.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }
}

impl TableSource for VecSource {
    fn rows(&self) -> u64 {
        self.rows.len() as u64
    }

    fn columns(&self) -> usize {
        self.names.len()
    }

    fn column_names(&self) -> &[String] {
        &self.names
    }

    fn cell(&mut self, row: u64, col: usize) -> crate::MorphResult<String> {
        Ok(self
            .rows
            .get(row as usize)
            .and_then(|cells| cells.get(col))
            .cloned()
            .unwrap_or_default())
    }
}

impl FilterCellSource for VecSource {
    fn fetch_cells(
        &mut self,
        start_row: u64,
        count: usize,
        columns: &[usize],
    ) -> crate::MorphResult<Vec<Vec<String>>> {
        Ok(self
            .rows
            .iter()
            .skip(start_row as usize)
            .take(count)
            .map(|row| {
                columns
                    .iter()
                    .map(|&c| row.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect())
    }
}

fn schema_of(columns: &[(&str, ColumnType)]) -> TableSchema {
    TableSchema::try_new(
        columns
            .iter()
            .enumerate()
            .map(|(i, (name, t))| ColumnSchema::new(*name, *t, false, i)),
        DataFormat::Csv,
    )
    .unwrap()
}

fn people() -> (VecSource, TableSchema) {
    let source = VecSource::new(
        &["name", "age", "score"],
        &[
            &["Alice", "30", "9"],
            &["Bob", "25", "7"],
            &["Carol", "40", "8"],
        ],
    );
    let schema = schema_of(&[
        ("name", ColumnType::Text),
        ("age", ColumnType::WholeNumber),
        ("score", ColumnType::WholeNumber),
    ]);
    (source, schema)
}

#[test]
fn empty_stack_is_observationally_transparent() {
    let (source, schema) = people();
    let mut transformer =
        LazyTransformer::new(Box::new(source.clone()), &schema, &ActionStack::new());
    assert_eq!(transformer.rows(), 3);
    assert_eq!(transformer.columns(), 3);
    assert_eq!(transformer.column_names(), source.column_names());
    assert_eq!(transformer.cell(1, 0).unwrap(), "Bob");
    assert_eq!(transformer.cell(2, 2).unwrap(), "8");
}

#[test]
fn rename_delete_cast_pipeline() {
    let (source, schema) = people();
    let actions: ActionStack = [
        MorphAction::Rename {
            old_name: "score".into(),
            new_name: "points".into(),
        },
        MorphAction::Delete {
            column_name: "age".into(),
        },
        MorphAction::Cast {
            column_name: "points".into(),
            target_type: ColumnType::WholeNumber,
        },
    ]
    .into_iter()
    .collect();

    let mut transformer = LazyTransformer::new(Box::new(source), &schema, &actions);
    assert_eq!(transformer.column_names(), &["name", "points"]);
    assert_eq!(transformer.cell(0, 1).unwrap(), "9");
    // the deleted column's data is unreachable
    assert_eq!(transformer.columns(), 2);
}

#[test]
fn actions_on_missing_columns_are_silent() {
    let (source, schema) = people();
    let actions: ActionStack = [
        MorphAction::Delete {
            column_name: "age".into(),
        },
        // age is gone: every one of these is a no-op
        MorphAction::Rename {
            old_name: "age".into(),
            new_name: "years".into(),
        },
        MorphAction::Cast {
            column_name: "age".into(),
            target_type: ColumnType::Text,
        },
        MorphAction::Filter {
            column_name: "age".into(),
            operator: FilterOperator::Gt,
            value: "1".into(),
        },
    ]
    .into_iter()
    .collect();

    let transformer = LazyTransformer::new(Box::new(source), &schema, &actions);
    assert_eq!(transformer.column_names(), &["name", "score"]);
    assert!(!transformer.has_filters());
}

#[test]
fn rename_then_filter_uses_the_new_name() {
    let (source, schema) = people();
    let actions: ActionStack = [
        MorphAction::Rename {
            old_name: "age".into(),
            new_name: "years".into(),
        },
        MorphAction::Filter {
            column_name: "years".into(),
            operator: FilterOperator::Ge,
            value: "30".into(),
        },
    ]
    .into_iter()
    .collect();

    let transformer = LazyTransformer::new(Box::new(source), &schema, &actions);
    let specs = transformer.filter_specs();
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].source_column_index, 1);
    assert_eq!(specs[0].column_type, ColumnType::WholeNumber);
}

#[test]
fn cast_changes_the_type_a_filter_sees() {
    let (source, schema) = people();
    let actions: ActionStack = [
        MorphAction::Cast {
            column_name: "age".into(),
            target_type: ColumnType::Text,
        },
        MorphAction::Filter {
            column_name: "age".into(),
            operator: FilterOperator::Gt,
            value: "30".into(),
        },
    ]
    .into_iter()
    .collect();

    let transformer = LazyTransformer::new(Box::new(source), &schema, &actions);
    assert_eq!(transformer.filter_specs()[0].column_type, ColumnType::Text);
}

#[test]
fn cast_renders_canonically_and_flags_bad_cells() {
    let source = VecSource::new(
        &["v"],
        &[&[" 42 "], &["007"], &["abc"], &["TRUE"], &["2024-01-05"]],
    );
    let schema = schema_of(&[("v", ColumnType::Text)]);

    let cast_to = |target| {
        let actions: ActionStack = [MorphAction::Cast {
            column_name: "v".into(),
            target_type: target,
        }]
        .into_iter()
        .collect();
        LazyTransformer::new(Box::new(source.clone()), &schema, &actions)
    };

    let mut whole = cast_to(ColumnType::WholeNumber);
    assert_eq!(whole.cell(0, 0).unwrap(), "42");
    assert_eq!(whole.cell(1, 0).unwrap(), "7");
    assert_eq!(whole.cell(2, 0).unwrap(), INVALID_CELL);

    let mut boolean = cast_to(ColumnType::Boolean);
    assert_eq!(boolean.cell(3, 0).unwrap(), "True");
    assert_eq!(boolean.cell(2, 0).unwrap(), INVALID_CELL);

    let mut timestamp = cast_to(ColumnType::Timestamp);
    assert_eq!(timestamp.cell(4, 0).unwrap(), "2024-01-05T00:00:00");
    assert_eq!(timestamp.cell(2, 0).unwrap(), INVALID_CELL);
}

#[test]
fn out_of_range_lookups_fail() {
    let (source, schema) = people();
    let mut transformer =
        LazyTransformer::new(Box::new(source), &schema, &ActionStack::new());
    assert!(matches!(
        transformer.cell(0, 9),
        Err(crate::Error::CellOutOfRange { .. })
    ));
    assert!(matches!(
        transformer.cell(3, 0),
        Err(crate::Error::CellOutOfRange { .. })
    ));
}

#[tokio::test]
async fn filtered_view_shows_matched_rows_only() {
    let (source, schema) = people();
    let actions: ActionStack = [MorphAction::Filter {
        column_name: "age".into(),
        operator: FilterOperator::Gt,
        value: "25".into(),
    }]
    .into_iter()
    .collect();

    let mut transformer = LazyTransformer::new(Box::new(source.clone()), &schema, &actions);
    // before the index is attached nothing is visible
    assert_eq!(transformer.rows(), 0);

    let indexer = Arc::new(FilterRowIndexer::new(transformer.filter_specs().to_vec()));
    indexer
        .build_index(Box::new(source), 3, CancellationToken::new())
        .await
        .unwrap();
    transformer.attach_filter_index(indexer);

    assert_eq!(transformer.rows(), 2);
    assert_eq!(transformer.cell(0, 1).unwrap(), "30");
    assert_eq!(transformer.cell(1, 1).unwrap(), "40");
    assert_eq!(transformer.cell(0, 0).unwrap(), "Alice");
    assert_eq!(transformer.cell(1, 0).unwrap(), "Carol");
}

#[test]
fn push_builds_a_new_stack() {
    let stack = ActionStack::new();
    let pushed = stack.push(MorphAction::Delete {
        column_name: "a".into(),
    });
    assert!(stack.is_empty());
    assert_eq!(pushed.len(), 1);
}
