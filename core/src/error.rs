use thiserror::Error;

/// Broad classification of a [`SearchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input handed to a construction or lookup call. Never retried.
    InvalidArgument,
    /// Programmer error surfaced while a search runs.
    IllegalState,
}

/// Errors raised while building a graph or running a search.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("edge lists have different lengths: from={from}, to={to}, weights={weights}")]
    LengthMismatch {
        from: usize,
        to: usize,
        weights: usize,
    },

    #[error("edge weight {weight} must be greater than {floor}")]
    WeightOutOfRange { weight: i32, floor: i32 },

    #[error("too many nodes, more than {max}")]
    TooManyNodes { max: usize },

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("path step {step} is not an edge of the graph")]
    MissingEdge { step: usize },

    #[error("invalid searcher configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),

    #[error("task issued FORK_CONTINUE but supplies no fork result handler")]
    MissingForkHandler,
}

impl SearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::MissingForkHandler => ErrorKind::IllegalState,
            _ => ErrorKind::InvalidArgument,
        }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
