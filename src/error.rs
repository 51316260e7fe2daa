use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

/// Errors surfaced by the simulation engine.
///
/// All failures are local and synchronous; the engine never retries on its
/// own except through the explicit [`crate::RetryController`].
#[derive(Debug, Error)]
pub enum SimError {
    /// Allocation would push the state vector past the configured budget.
    #[error("allocating {requested} qubit(s) would exceed the budget of {max} ({live} live); the state vector grows as 2^n")]
    Capacity {
        requested: usize,
        live: usize,
        max: usize,
    },

    /// Gate matrix size disagrees with the number of target qubits.
    #[error("gate matrix is {rows}x{cols}, but {targets} target(s) require {expected}x{expected}")]
    Dimension {
        targets: usize,
        expected: usize,
        rows: usize,
        cols: usize,
    },

    /// A caller-supplied matrix failed the unitarity check.
    #[error("matrix is not unitary: max |U\u{2020}U - I| entry {deviation:.3e} exceeds tolerance {tolerance:.3e}")]
    NotUnitary { deviation: f64, tolerance: f64 },

    /// Deallocating a qubit that is still in superposition.
    #[error("qubit {id} is not in a definite classical state and cannot be discarded")]
    InvalidState { id: usize },

    /// Measuring a qubit that already collapsed and was not re-superposed.
    #[error("qubit {id} has already been measured")]
    AlreadyMeasured { id: usize },

    /// Illegal scope usage (nesting, stale handle, measurement mid-scope).
    #[error("scope conflict: {0}")]
    ScopeConflict(String),

    /// The retry controller ran out of attempts.
    #[error("no successful attempt after {attempts} tries")]
    RetryExhausted { attempts: u64 },

    /// Accumulated floating-point drift left the state non-physical.
    #[error("state norm {norm} drifted beyond tolerance; refusing to sample from a non-physical distribution")]
    NumericalDivergence { norm: f64 },

    /// A handle that is not live in this engine.
    #[error("qubit {id} is not live in this engine")]
    InvalidQubit { id: usize },

    /// The same qubit named twice across targets and controls.
    #[error("qubit {id} appears more than once across targets and controls")]
    DuplicateQubit { id: usize },

    /// Basis index outside the current state vector.
    #[error("basis index {index} is out of range for {qubits} live qubit(s)")]
    InvalidIndex { index: usize, qubits: usize },
}
