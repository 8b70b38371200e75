//! Defines [`Error`], the uniform error type for the engine, and the crate-wide
//! [`MorphResult`] alias.

/// A [`std::result::Result`] that has the engine [`Error`] as the error variant
pub type MorphResult<T, E = Error> = std::result::Result<T, E>;

/// All errors the engine can surface. Expected failures (I/O, format, schema,
/// recipe) are returned through [`MorphResult`]; the engine does not panic on
/// malformed input.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An error performing file I/O
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the CSV reader
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An arbitrary error with a message
    #[error("Generic datamorph error: {0}")]
    Generic(String),

    /// The input had no bytes at all
    #[error("File is empty")]
    EmptyFile,

    /// The input had bytes, but only ASCII whitespace
    #[error("File contains only whitespace")]
    WhitespaceOnly,

    /// The input was neither JSON nor a CSV file with a usable header
    #[error("Invalid CSV format: requires at least 2 columns. Supported formats: CSV, JSON Lines, JSON Array, JSON Object")]
    CsvTooFewColumns,

    /// The first non-whitespace byte announced JSON, but it did not parse
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),

    /// A schema could not be derived from the scanned rows
    #[error("Schema error: {0}")]
    Schema(String),

    /// A read landed outside the mapped file
    #[error("read of {len} bytes at offset {offset} is out of bounds for a source of {source_len} bytes")]
    ReadOutOfBounds {
        offset: u64,
        len: usize,
        source_len: u64,
    },

    /// A table lookup landed outside the visible rows or columns
    #[error("cell index out of range: row {row}, column {col}")]
    CellOutOfRange { row: u64, col: usize },

    /// A recipe without its one required field
    #[error("recipe is missing required field `name`")]
    RecipeMissingName,

    /// An action item whose `type` discriminator is not one of rename/delete/cast/filter
    #[error("unknown recipe action type `{0}`")]
    RecipeUnknownActionType(String),

    /// An action item missing one of its required fields
    #[error("recipe action `{action}` is missing required field `{field}`")]
    RecipeMissingField { action: String, field: String },

    /// An enum-valued recipe field that is not an exact member name
    #[error("unparseable value `{value}` for recipe field `{field}`")]
    RecipeBadEnumValue { field: String, value: String },

    /// A recipe line indented in a way the grammar does not allow
    #[error("malformed indentation at recipe line {line}")]
    RecipeBadIndentation { line: usize },
}

impl Error {
    pub fn generic(msg: impl ToString) -> Self {
        Self::Generic(msg.to_string())
    }

    pub fn schema(msg: impl ToString) -> Self {
        Self::Schema(msg.to_string())
    }

    pub fn invalid_json(msg: impl ToString) -> Self {
        Self::InvalidJson(msg.to_string())
    }
}
