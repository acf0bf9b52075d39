//! Error taxonomy shared by the arena, the mesh repair engine, the BSP context
//! and the cutting plan.

/// All the failures an operation of this crate can report.
///
/// Geometric edge cases (near-coplanar, near-collinear input) are *not* errors:
/// they are resolved through tolerance-based classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// An arena or output buffer could not grow.
    #[error("(OutOfMemory) could not grow storage to {requested} elements")]
    OutOfMemory { requested: usize },

    /// An index space or a work budget was exhausted.
    #[error("(Overflow) {0}")]
    Overflow(String),

    /// The input geometry is malformed or the structure is not in a state
    /// that allows the operation.
    #[error("(BadState) {0}")]
    BadState(String),

    /// The caller supplied an argument the operation cannot use.
    #[error("(BadArguments) {0}")]
    BadArguments(String),
}

pub type Result<T> = std::result::Result<T, Error>;
