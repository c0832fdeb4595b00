//! Mapping from `sqlx` failures onto the pipeline error taxonomy.

use orderline_core::error::PipelineError;

pub(crate) fn persistence(context: &str, err: &sqlx::Error) -> PipelineError {
    PipelineError::Persistence(format!("{context}: {err}"))
}

pub(crate) fn transport(context: &str, err: &sqlx::Error) -> PipelineError {
    PipelineError::Transport(format!("{context}: {err}"))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
