use thiserror::Error;

/// Postgres error codes that mean the expected schema objects are absent:
/// undefined_table (42P01) and invalid_schema_name (3F000). These are the
/// known, enumerable conditions the store degrades on instead of failing.
const SCHEMA_MISSING_CODES: &[&str] = &["42P01", "3F000"];

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The table or schema the query expects does not exist.
    #[error("schema object missing (code {code}): {message}")]
    SchemaMissing { code: String, message: String },

    #[error("row not found")]
    NotFound,

    #[error("database error: {message}")]
    Other { message: String },
}

impl DatabaseError {
    pub fn from_sqlx(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if let Some(code) = db_err.code() {
                if SCHEMA_MISSING_CODES.contains(&code.as_ref()) {
                    return DatabaseError::SchemaMissing {
                        code: code.to_string(),
                        message: db_err.message().to_string(),
                    };
                }
            }
        }

        match e {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            other => DatabaseError::Other {
                message: other.to_string(),
            },
        }
    }

    /// True when the failure is the expected "table not created yet"
    /// condition rather than an operational fault.
    pub fn is_table_missing(&self) -> bool {
        matches!(self, DatabaseError::SchemaMissing { .. })
    }
}
