use thiserror::Error;

/// Errors surfaced by the coupling core. Nothing is swallowed: every failure
/// propagates to the driver with enough context to tell whether the problem
/// is tolerance, iteration bound, or solver instability.
#[derive(Debug, Error)]
pub enum CouplingError {
    /// The fixed-point loop exhausted its iteration bound.
    #[error(
        "fixed-point iteration failed to converge after {iterations} iterations \
         (last displacement delta {last_delta:.3e})"
    )]
    NotConverged { iterations: usize, last_delta: f64 },

    /// An external solver failed or produced a non-finite result.
    #[error("{solver} solver failure: {reason}")]
    SolverFailure { solver: &'static str, reason: String },

    /// A field or mesh does not match the shape the operator was built for.
    /// Detected at construction or at the transfer boundary, never mid-loop.
    #[error("mesh mismatch in {what}: expected {expected}, found {found}")]
    MeshMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// The outer time march halted because the inner loop failed at `step`.
    #[error("time step {step} failed: {source}")]
    StepFailed {
        step: usize,
        #[source]
        source: Box<CouplingError>,
    },

    /// A mesh file was structurally invalid (bad connectivity, shape, ...).
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("failed to read mesh file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse mesh file: {0}")]
    Parse(#[from] serde_yaml::Error),
}
