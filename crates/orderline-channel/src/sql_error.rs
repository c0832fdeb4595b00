use orderline_core::error::PipelineError;

pub(crate) fn transport(context: &str, err: &sqlx::Error) -> PipelineError {
    PipelineError::Transport(format!("{context}: {err}"))
}
