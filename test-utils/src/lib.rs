//! A number of utilities useful for testing that we want to use in multiple crates

use std::io::Write;
use std::path::PathBuf;

use itertools::Itertools;

/// A small CSV table with one numeric, one text, and one numeric column
pub const PEOPLE_CSV: &str = "id,name,age\n1,Alice,30\n2,Bob,25\n3,Carol,40\n";

/// JSON Lines rows whose key sets differ, so the scanned schema is a
/// first-seen union with nullable tail columns
pub const EVENTS_JSONL: &str = concat!(
    "{\"id\":1,\"name\":\"A\"}\n",
    "{\"id\":2,\"email\":\"b@x\"}\n",
    "{\"id\":3,\"name\":\"C\",\"email\":\"c@x\"}\n",
);

/// Write `contents` into a fresh temp dir and return the dir (keep it alive)
/// plus the file path
pub fn write_temp_file(name: &str, contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join(name);
    std::fs::File::create(&path)
        .expect("create temp file")
        .write_all(contents.as_bytes())
        .expect("write temp file");
    (dir, path)
}

/// A CSV file with the header `a` and `rows` copies of `x,y`, matching the
/// shape used to exercise checkpoint arithmetic
pub fn csv_with_rows(rows: usize) -> String {
    let mut contents = String::with_capacity(2 + rows * 4);
    contents.push_str("a\n");
    for _ in 0..rows {
        contents.push_str("x,y\n");
    }
    contents
}

/// JSON Lines content with `rows` objects `{"n":<i>}`
pub fn jsonl_with_rows(rows: usize) -> String {
    (0..rows).map(|i| format!("{{\"n\":{i}}}")).join("\n") + "\n"
}
