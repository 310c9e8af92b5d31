// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors surfaced by the bench binary.

use trellis_dataflow::{ConnectionError, EvaluationError};
use trellis_slab::SlabError;

/// Error while running the benchmark or the demo
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Settings file could not be read or written
    #[error("Settings error: {0}")]
    Settings(#[from] std::io::Error),

    /// Slab allocation or field access failed
    #[error(transparent)]
    Slab(#[from] SlabError),

    /// Graph edit failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Graph read failed
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// Node type or port missing from the registry
    #[error("Unknown node type or port: {0}")]
    Missing(String),
}
