//! Recipe codec coverage: canonical emission, hand-edited input, and the
//! round trip against a live action stack.

use chrono::{TimeZone, Utc};
use datamorph_engine::recipe::{deserialize, serialize};
use datamorph_engine::{ActionStack, ColumnType, FilterOperator, MorphAction, Recipe};
use test_utils::write_temp_file;

fn sample_stack() -> ActionStack {
    [
        MorphAction::Rename {
            old_name: "a".into(),
            new_name: "b".into(),
        },
        MorphAction::Delete {
            column_name: "c".into(),
        },
        MorphAction::Cast {
            column_name: "b".into(),
            target_type: ColumnType::WholeNumber,
        },
        MorphAction::Filter {
            column_name: "b".into(),
            operator: FilterOperator::Contains,
            value: "7".into(),
        },
    ]
    .into_iter()
    .collect()
}

#[test_log::test]
fn emission_matches_the_canonical_shape() {
    let recipe = Recipe::new("tidy", sample_stack());
    let text = serialize(&recipe);
    let lines: Vec<&str> = text.lines().collect();

    // top-level order: name first, then straight to actions (no description)
    assert_eq!(lines[0], "name: \"tidy\"");
    assert_eq!(lines[1], "actions:");
    assert!(!text.contains("description"));
    // discriminators are lowercase, enum values exact member names, unquoted
    assert!(text.contains("  - type: rename\n"));
    assert!(text.contains("  - type: delete\n"));
    assert!(text.contains("  - type: cast\n"));
    assert!(text.contains("  - type: filter\n"));
    assert!(text.contains("    target_type: WholeNumber\n"));
    assert!(text.contains("    operator: Contains\n"));
    // type is always the first field of each item
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("  - ") {
            assert!(line.starts_with("  - type: "), "line {i}: {line}");
        }
    }
}

#[test_log::test]
fn round_trip_preserves_everything() {
    let recipe = Recipe::new("full", sample_stack())
        .with_description("all four kinds")
        .with_last_modified(Utc.with_ymd_and_hms(2024, 11, 5, 8, 30, 0).unwrap());
    assert_eq!(deserialize(&serialize(&recipe)).unwrap(), recipe);
}

#[test_log::test]
fn hand_edited_text_with_comments_parses() {
    let text = "\
# cleanup recipe, edited by hand
name: \"hand edited\"

actions:
  # drop the noisy column first
  - type: delete
    column_name: \"noise\"
  - type: filter
    column_name: \"level\"
    operator: Ge
    value: \"3\"
";
    let recipe = deserialize(text).unwrap();
    assert_eq!(recipe.name, "hand edited");
    assert_eq!(recipe.actions.len(), 2);
    assert_eq!(
        recipe.actions.actions()[1],
        MorphAction::Filter {
            column_name: "level".into(),
            operator: FilterOperator::Ge,
            value: "3".into(),
        }
    );
}

#[test_log::test]
fn file_round_trip_uses_newline_endings() {
    let recipe = Recipe::new("on disk", sample_stack());
    let (_dir, path) = write_temp_file("recipe.yaml", "");
    recipe.to_file(&path).unwrap();
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains('\r'));
    assert!(!raw.starts_with('\u{feff}'));
    assert_eq!(Recipe::from_file(&path).unwrap(), recipe);
}
