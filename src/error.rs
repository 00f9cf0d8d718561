use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Unsupported file name: {0} (expected out_*.csv or in_*.csv)")]
    UnsupportedFileName(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Missing required column: {0}")]
    MissingRequiredColumn(String),

    #[error("No kit columns found in outbound report")]
    NoKitColumnsFound,

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Config: {0}")]
    Config(String),
}

impl ReportError {
    /// True for the file-level failures a user can fix by correcting the upload.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFileName(_)
                | Self::MalformedInput(_)
                | Self::MissingRequiredColumn(_)
                | Self::NoKitColumnsFound
        )
    }
}

impl From<toml::de::Error> for ReportError {
    fn from(err: toml::de::Error) -> Self {
        ReportError::Config(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<ReportError> for pyo3::PyErr {
    fn from(err: ReportError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyRuntimeError, PyValueError};
        if err.is_input_error() {
            PyValueError::new_err(err.to_string())
        } else {
            PyRuntimeError::new_err(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_message_names_the_column() {
        let err = ReportError::MissingRequiredColumn("Territory".into());
        assert_eq!(err.to_string(), "Missing required column: Territory");
        assert!(err.is_input_error());
    }

    #[test]
    fn config_errors_are_not_input_errors() {
        let err: ReportError = toml::from_str::<toml::Table>("= broken").unwrap_err().into();
        assert!(matches!(err, ReportError::Config(_)));
        assert!(!err.is_input_error());
    }
}
