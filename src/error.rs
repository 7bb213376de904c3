use sea_orm::DbErr;
use thiserror::Error;

/// An error from a paranoid operation
#[derive(Error, Debug)]
pub enum ParanoidError {
    /// Error returned by SeaORM or the database driver, passed through untouched
    #[error(transparent)]
    Db(#[from] DbErr),
    /// A find option was not recognized or could not be parsed
    #[error("Invalid find option: {0}")]
    InvalidOption(String),
    /// A scope was entered while another one is still active on the same repository
    #[error("Cannot nest query scopes; `{active}` is already active")]
    ScopeConflict {
        /// The condition of the scope currently in effect
        active: String,
    },
    /// A column named by configuration does not exist on the entity
    #[error("Column `{column}` does not exist on `{table}`")]
    MissingColumn {
        /// Table of the entity
        table: String,
        /// Name of the missing column
        column: String,
    },
}

impl From<serde_json::Error> for ParanoidError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidOption(err.to_string())
    }
}
