//! End-to-end coverage of the CSV path: detect, index, scan, transform,
//! filter.

use std::time::Duration;

use datamorph_engine::index::CsvRowIndexer;
use datamorph_engine::schema::scan_csv_schema;
use datamorph_engine::{
    detect, AppState, ColumnType, DataFormat, Error, FileLoader, MmapSource, MorphResult,
    MorphAction, FilterOperator,
};
use test_utils::{csv_with_rows, write_temp_file, PEOPLE_CSV};
use tokio_util::sync::CancellationToken;

fn detect_file(path: &std::path::Path) -> MorphResult<DataFormat> {
    detect(|| Ok(std::fs::File::open(path)?))
}

async fn wait_for(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("background work did not settle");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn detect_and_scan_a_small_table() {
    let (_dir, path) = write_temp_file("people.csv", PEOPLE_CSV);
    assert_eq!(detect_file(&path).unwrap(), DataFormat::Csv);

    let loader = FileLoader::new(tokio::runtime::Handle::current());
    let mut state = AppState::new();
    loader.load(&mut state, &path).unwrap();

    let schema = state.schema.load().unwrap();
    assert_eq!(schema.column_names(), vec!["id", "name", "age"]);
    let types: Vec<_> = schema.columns().iter().map(|c| c.column_type()).collect();
    assert_eq!(
        types,
        vec![
            ColumnType::WholeNumber,
            ColumnType::Text,
            ColumnType::WholeNumber
        ]
    );

    let index = state.row_index.clone().unwrap();
    wait_for(|| index.is_complete()).await;
    assert_eq!(index.total_rows(), 3);

    let mut view = loader.build_view(&state).unwrap().unwrap();
    assert_eq!(view.rows(), 3);
    assert_eq!(view.cell(2, 1).unwrap(), "Carol");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn background_refinement_converges_to_floating_point() {
    let mut contents = String::from("id,score\n1,123\n");
    for i in 0..300 {
        contents.push_str(&format!("{},123.45\n", i + 2));
    }
    let (_dir, path) = write_temp_file("scores.csv", &contents);
    let loader = FileLoader::new(tokio::runtime::Handle::current());
    let mut state = AppState::new();
    loader.load(&mut state, &path).unwrap();

    // the initial 200-row scan already promotes within its window; the
    // background pass covers the rest and keeps the result stable
    let schema_slot = state.schema.clone();
    wait_for(move || {
        schema_slot
            .load()
            .is_some_and(|s| s.column(1).unwrap().column_type() == ColumnType::FloatingPoint)
    })
    .await;
    let schema = state.schema.load().unwrap();
    let score = schema.column(1).unwrap();
    assert_eq!(score.column_type(), ColumnType::FloatingPoint);
    assert!(!score.is_nullable());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn checkpoint_lookup_across_two_thousand_rows() {
    let (_dir, path) = write_temp_file("wide.csv", &csv_with_rows(2000));
    let source = MmapSource::open(&path).unwrap();
    let indexer = CsvRowIndexer::new(source).unwrap();
    indexer.build_index(CancellationToken::new()).await.unwrap();

    let index = indexer.index();
    assert_eq!(index.total_rows(), 2000);
    // the header is `a\n`, each row `x,y\n`
    assert_eq!(index.get_checkpoint(1500), (2 + 1000 * 4, 500));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn transform_stack_over_a_real_file() {
    let (_dir, path) = write_temp_file(
        "grades.csv",
        "name,age,score\nAlice,30,9\nBob,25,7\nCarol,40,8\n",
    );
    let loader = FileLoader::new(tokio::runtime::Handle::current());
    let mut state = AppState::new();
    loader.load(&mut state, &path).unwrap();
    let index = state.row_index.clone().unwrap();
    wait_for(|| index.is_complete()).await;

    state.append_action(MorphAction::Rename {
        old_name: "score".into(),
        new_name: "points".into(),
    });
    state.append_action(MorphAction::Delete {
        column_name: "age".into(),
    });
    state.append_action(MorphAction::Cast {
        column_name: "points".into(),
        target_type: ColumnType::WholeNumber,
    });

    let mut view = loader.build_view(&state).unwrap().unwrap();
    assert_eq!(view.column_names(), &["name", "points"]);
    assert_eq!(view.cell(1, 0).unwrap(), "Bob");
    assert_eq!(view.cell(1, 1).unwrap(), "7");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn numeric_filter_end_to_end() {
    let (_dir, path) = write_temp_file("people.csv", PEOPLE_CSV);
    let loader = FileLoader::new(tokio::runtime::Handle::current());
    let mut state = AppState::new();
    loader.load(&mut state, &path).unwrap();
    let index = state.row_index.clone().unwrap();
    wait_for(|| index.is_complete()).await;
    assert!(state.can_apply_filter());

    state.append_action(MorphAction::Filter {
        column_name: "age".into(),
        operator: FilterOperator::Gt,
        value: "25".into(),
    });
    let mut view = loader.build_view(&state).unwrap().unwrap();
    wait_for(|| view.rows() == 2).await;
    assert_eq!(view.cell(0, 2).unwrap(), "30");
    assert_eq!(view.cell(1, 2).unwrap(), "40");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn detection_boundaries() {
    let (_dir, empty) = write_temp_file("empty.csv", "");
    assert!(matches!(detect_file(&empty), Err(Error::EmptyFile)));

    let (_dir2, blank) = write_temp_file("blank.csv", "  \n\t \n");
    assert!(matches!(detect_file(&blank), Err(Error::WhitespaceOnly)));

    let (_dir3, narrow) = write_temp_file("narrow.csv", "only\n1\n2\n");
    assert!(matches!(detect_file(&narrow), Err(Error::CsvTooFewColumns)));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn header_only_file_is_all_nullable_text_with_zero_rows() {
    let (_dir, path) = write_temp_file("bare.csv", "a,b,c\n");
    let loader = FileLoader::new(tokio::runtime::Handle::current());
    let mut state = AppState::new();
    loader.load(&mut state, &path).unwrap();
    let index = state.row_index.clone().unwrap();
    wait_for(|| index.is_complete()).await;

    assert_eq!(index.total_rows(), 0);
    let schema = state.schema.load().unwrap();
    for column in schema.columns() {
        assert_eq!(column.column_type(), ColumnType::Text);
        assert!(column.is_nullable());
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn scan_schema_matches_detection_scenario() {
    // the schema pieces compose without the loader too
    let schema = scan_csv_schema(
        &["id".into(), "name".into(), "age".into()],
        &[
            vec!["1".into(), "Alice".into(), "30".into()],
            vec!["2".into(), "Bob".into(), "25".into()],
        ],
    )
    .unwrap();
    assert_eq!(schema.source_format(), DataFormat::Csv);
    assert_eq!(
        schema.column(0).unwrap().column_type(),
        ColumnType::WholeNumber
    );
}
