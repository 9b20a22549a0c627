use thiserror::Error;

/// Result type local to jtree-learning.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not build a pool of {threads} worker thread(s): {message}")]
    ThreadPool { threads: usize, message: String },

    #[error("invalid graph change {0}")]
    InvalidChange(String),

    #[error(transparent)]
    Graph(#[from] jtree_core::Error),

    #[error(transparent)]
    Triangulation(#[from] jtree_triangulation::Error),
}
