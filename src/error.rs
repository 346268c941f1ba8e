//! Error types for the symbolic generation pipeline.
//!
//! Every fallible stage of the pipeline (Wick contraction, RDM resolution,
//! factorization, and code emission) returns `Result<_, Error>`. Nothing in
//! this crate retries: a raised error means the symbolic input was
//! malformed, which is a bug in the caller's construction, not a transient
//! condition.

use crate::index::Index;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("delta pair ({0:?}, {1:?}) couples incompatible index spaces")]
    InvalidIndexSpace(Index, Index),

    #[error("RDM resolution left {0} unresolved active operator(s)")]
    UnresolvedActive(usize),

    #[error("unknown equation tree type: {0:?}")]
    UnknownTreeType(String),

    #[error("no p/q with q <= 1024 approximates factor {0}")]
    IrrationalFactor(f64),

    #[error("malformed diagram: {0}")]
    MalformedDiagram(String),

    #[error("emitter asked to sort indices with no loop and no fallback index")]
    EmptyLoop,
}

pub type Result<T> = std::result::Result<T, Error>;
