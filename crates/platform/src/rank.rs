//! Rank detection
//!
//! Orchestrators announce each worker's rank through their own environment
//! variables. We check a fixed list in priority order; the first variable
//! present decides.

use crate::environment::Environment;

/// Rank variables in priority order
pub const RANK_VARIABLES: [&str; 4] = [
    // Open MPI
    "OMPI_COMM_WORLD_RANK",
    // MPICH, Intel MPI, MS-MPI (and our own worker pool)
    "PMI_RANK",
    // SLURM
    "SLURM_PROCID",
    // MVAPICH
    "MV2_COMM_WORLD_RANK",
];

/// Resolve this process's rank.
///
/// Returns `None` when no rank variable is present, or when the first one
/// present does not hold a number.
pub fn resolve_rank(env: &Environment) -> Option<usize> {
    let value = RANK_VARIABLES.iter().find_map(|var| env.get_str(var))?;
    value.trim().parse().ok()
}

/// Whether this process should print informational output.
///
/// True for rank 0 and for an unresolved rank (plain serial runs).
pub fn is_primary(env: &Environment) -> bool {
    matches!(resolve_rank(env), None | Some(0))
}
