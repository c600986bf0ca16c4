//! External runner boundary: subprocess invocation plus artifact loading.
//!
//! The harness never looks inside the model runner. Everything crosses a
//! single call shape, [`Runner::invoke`], and the artifacts the runner leaves
//! behind are read back through the loaders in this crate.

mod artifacts;
mod process;

pub use artifacts::{
    hash_artifact, load_manifest, load_trace, require_fields, ArtifactMap, MANIFEST_FILE,
    TRACE_FILE,
};
pub use process::{
    write_stream_logs, RunResult, Runner, SubprocessRunner, ARTIFACT_DIR, STDERR_LOG, STDOUT_LOG,
};
