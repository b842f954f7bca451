use std::fmt;

use thiserror::Error;

/// Which of the two source tables a problem was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Responses,
    Roster,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Responses => f.write_str("responses"),
            TableKind::Roster => f.write_str("students"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DashboardError {
    /// A view needs a column the source sheet does not have.
    #[error("column '{column}' not found in the {table} sheet")]
    MissingColumn { table: TableKind, column: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error("failed to fetch {location}: {source}")]
    Fetch {
        location: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{location} answered with HTTP {status}")]
    Status {
        location: String,
        status: reqwest::StatusCode,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl DashboardError {
    pub fn missing(table: TableKind, column: &str) -> Self {
        DashboardError::MissingColumn {
            table,
            column: column.to_string(),
        }
    }

    /// True for problems that only take a single view offline.
    pub fn is_view_local(&self) -> bool {
        matches!(
            self,
            DashboardError::MissingColumn { .. } | DashboardError::InvalidInput(_)
        )
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;
