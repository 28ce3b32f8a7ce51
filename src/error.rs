//src/error.rs

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Every failure the pipeline can surface. Incomplete or already annotated
/// samples are filtering outcomes, not errors, so they have no variant here.
#[derive(Debug, Error)]
pub enum GenotypeError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("input not found: {0:?}")]
    MissingInput(PathBuf),

    #[error("malformed FASTA {path:?} at line {line}: {reason}")]
    MalformedFasta {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("no reference FASTA files found in {0:?}")]
    NoReferenceFiles(PathBuf),

    #[error("{tool} exited with {status}: {stderr}")]
    ExternalTool {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} did not finish within {limit:?} and was killed")]
    Timeout { tool: String, limit: Duration },

    #[error("classifier output unusable: {0}")]
    ClassifierOutput(String),

    #[error("classifier output is missing expected columns: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("row columns do not match the header of {path:?} (missing: [{}], unexpected: [{}])", missing.join(", "), unexpected.join(", "))]
    HeaderMismatch {
        path: PathBuf,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("result store {0:?} has no Strain column")]
    MissingStrainColumn(PathBuf),
}

pub type Result<T> = std::result::Result<T, GenotypeError>;

/// Attach a path to an `io::Error`, e.g. `fs::read(&p).map_err(io_err(&p))?`.
pub(crate) fn io_err<P: Into<PathBuf>>(path: P) -> impl FnOnce(io::Error) -> GenotypeError {
    let path = path.into();
    move |source| GenotypeError::Io { path, source }
}
