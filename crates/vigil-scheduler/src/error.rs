use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("state error: {0}")]
    State(#[from] vigil_state::StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
