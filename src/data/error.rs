use thiserror::Error;

/// Typed failures of the data layer.
///
/// Loader entry points wrap these in `anyhow::Error` with file context.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Unsupported file extension: .{0}")]
    UnsupportedExtension(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Bad value in row {row}, column '{column}': {message}")]
    BadCell {
        row: usize,
        column: String,
        message: String,
    },

    #[error("Unsupported column type for '{column}': {data_type}")]
    UnsupportedType { column: String, data_type: String },
}
