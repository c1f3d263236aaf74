//! Failure classification
//!
//! Native program failures whose text mentions the MPI runtime are almost
//! always installation or invocation problems. Those get replaced by
//! remediation guidance; everything else is shown unmodified.
//!
//! Matching is per token: the text is split on characters other than
//! letters, digits and `_`, so `compiled` or `supported` never match.

use mpirt_platform::PlatformTag;

/// Lower-case tokens marking an MPI runtime failure
pub const MPI_FAILURE_KEYWORDS: [&str; 11] = [
    "mpi", "mpi_init", "mpirun", "mpiexec", "comm_f2c", "libmpi", "msmpi", "orte", "orted",
    "pmi", "pmix",
];

/// Lower-case token prefixes marking an MPI runtime failure
pub const MPI_FAILURE_PREFIXES: [&str; 8] =
    ["mpi_", "pmpi_", "libmpi", "ompi_", "orte_", "pmi_", "pmi2_", "pmix_"];

/// Kind of a native program failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The MPI runtime is missing or was invoked incorrectly
    MpiRuntime,
    /// Anything else
    Other,
}

/// Classify failure text by keyword, case-insensitively
pub fn classify_failure(text: &str) -> FailureClass {
    let lower = text.to_lowercase();
    let is_mpi = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(is_mpi_token);
    if is_mpi {
        FailureClass::MpiRuntime
    } else {
        FailureClass::Other
    }
}

fn is_mpi_token(token: &str) -> bool {
    MPI_FAILURE_KEYWORDS.contains(&token)
        || MPI_FAILURE_PREFIXES.iter().any(|p| token.starts_with(p))
}

/// Remediation guidance for an MPI runtime failure on `platform`
pub fn remediation(platform: PlatformTag) -> String {
    let install = match platform {
        PlatformTag::WindowsAmd64 => {
            "   Windows:      install Microsoft MPI (msmpisetup.exe) from\n\
             \x20                https://learn.microsoft.com/message-passing-interface/microsoft-mpi"
                .to_string()
        }
        _ => [
            "   macOS:        brew install open-mpi",
            "   Ubuntu:       sudo apt install libopenmpi-dev",
            "   CentOS/RHEL:  sudo yum install openmpi-devel",
            "   Conda:        conda install openmpi",
        ]
        .join("\n"),
    };

    let rule = "=".repeat(60);
    format!(
        "{rule}\n\
         MPI error detected\n\
         {rule}\n\
         This usually means MPI is not installed on this machine, or the\n\
         program was started by an orchestrator from another MPI installation.\n\
         \n\
         Install MPI:\n\
         {install}\n\
         \n\
         For parallel execution:\n\
         \x20  mpirt run -n <N>\n\
         \x20  (where <N> is the number of processes)\n\
         \n\
         For single-process execution:\n\
         \x20  mpirt run\n\
         {rule}"
    )
}

/// Text to show the user for a failure: remediation for MPI failures
/// (with the original text appended), the original text otherwise
pub fn explain_failure(text: &str, platform: PlatformTag) -> String {
    match classify_failure(text) {
        FailureClass::MpiRuntime => format!("{}\nError details: {}", remediation(platform), text),
        FailureClass::Other => text.to_string(),
    }
}
