use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::ExitStatus,
};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{instrument, trace};

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Failed to launch '{}' for '{path}'", .binary.display())]
    Spawn {
        binary: PathBuf,
        path: String,
        #[source]
        error: io::Error,
    },

    #[error("'curl {path}' exited with {status}: {stderr}")]
    Failed {
        path: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("No response for '{0}'")]
    NoResponse(String),
}

/// An already-authenticated connection to the control API.
///
/// Implementations return the captured output of the call, one entry per line.
/// Large payloads can be wrapped over several lines, use [`response_body`] to
/// put the document back together.
#[allow(async_fn_in_trait)]
pub trait CliConnection {
    async fn curl(&self, path: &str) -> Result<Vec<String>, ConnectionError>;
}

/// Reassemble captured output lines into a single response document
pub fn response_body<S: AsRef<str>>(lines: &[S]) -> String {
    itertools::join(lines.iter().map(|l| l.as_ref()), "\n")
}

/// What `cf curl` prints in place of the resource when the API rejects a
/// request. The exit status is still zero.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDocument {
    pub(crate) error_code: String,
    #[serde(default)]
    pub(crate) description: String,
}

impl ApiErrorDocument {
    pub(crate) fn is_error_document(doc: &serde_json::Value) -> bool {
        doc.get("error_code").is_some()
    }
}

/// Reaches the control API through `cf curl`, reusing the session the cf CLI
/// already holds
#[derive(Clone, Debug)]
pub struct CfCliConnection {
    binary: PathBuf,
}

impl CfCliConnection {
    pub fn new(binary: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Default for CfCliConnection {
    fn default() -> Self {
        Self::new(diego_blame_config::DEFAULT_CF_BINARY)
    }
}

impl CliConnection for CfCliConnection {
    #[instrument(skip(self), fields(binary = %self.binary.display()))]
    async fn curl(&self, path: &str) -> Result<Vec<String>, ConnectionError> {
        let args: [OsString; 2] = ["curl".into(), path.into()];
        let output = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| ConnectionError::Spawn {
                binary: self.binary.clone(),
                path: path.to_owned(),
                error,
            })?;

        if !output.status.success() {
            return Err(ConnectionError::Failed {
                path: path.to_owned(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<String> = stdout.lines().map(str::to_owned).collect();
        trace!(lines = lines.len(), "captured response");
        Ok(lines)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_lines_rejoin_into_one_document() {
        let lines = ["{\"a\":", "  [1, 2,", "3]}"];
        let body = response_body(&lines);
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["a"][2], 3);
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let conn = CfCliConnection::new("/nonexistent/diego-blame/cf");
        let err = conn.curl("/v2/apps").await.unwrap_err();
        assert!(matches!(err, ConnectionError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_a_failure() {
        let conn = CfCliConnection::new("false");
        let err = conn.curl("/v2/apps").await.unwrap_err();
        assert!(matches!(err, ConnectionError::Failed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_lines() {
        // `echo curl /v2/apps` prints its arguments back
        let conn = CfCliConnection::new("echo");
        let lines = conn.curl("/v2/apps").await.unwrap();
        assert_eq!(lines, vec!["curl /v2/apps".to_owned()]);
    }
}
