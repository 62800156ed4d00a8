//! Execution pipeline: one webhook delivery becomes one job submission.
//!
//! Steps run strictly in order and the first failure ends the run. Nothing
//! is retried. The staged credential is removed when the run ends, and the
//! connection is closed once it was opened, whatever the outcome.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use qaas_core::{Owner, PAYLOAD_NAME, SCRIPT_POINTER_NAME};
use qaas_keys::KeyError;
use qaas_transport::{Transport, shell_quote};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::{RelayConfig, ServerConfig};
use crate::error::{Missing, QaasError};

/// Everything one pipeline run needs. Built per delivery, never stored.
#[derive(Debug)]
pub struct ExecutionRequest {
    pub identifier: String,
    pub owner: Owner,
    pub payload: Vec<u8>,
    /// Canonical private key of the owner.
    pub private_key: PathBuf,
    /// Per-owner directory receiving the short-lived key copy.
    pub staging_dir: PathBuf,
    /// Workspace on the local mount.
    pub workspace: PathBuf,
    /// The same workspace as seen from the relay node.
    pub remote_workspace: PathBuf,
    pub relay: RelayConfig,
    pub submit_command: String,
}

impl ExecutionRequest {
    pub fn new(config: &ServerConfig, identifier: &str, owner: Owner, payload: Vec<u8>) -> Self {
        Self {
            identifier: identifier.to_string(),
            private_key: config.key_paths(&owner).private_key,
            staging_dir: owner.dir_in(&config.staging_dir()),
            workspace: owner.workspace_in(&config.home_dir, identifier),
            remote_workspace: owner.workspace_in(&config.remote_home_dir, identifier),
            relay: config.relay.clone(),
            submit_command: config.submit_command.clone(),
            owner,
            payload,
        }
    }

    pub fn script_pointer(&self) -> PathBuf {
        self.workspace.join(SCRIPT_POINTER_NAME)
    }

    pub fn payload_path(&self) -> PathBuf {
        self.workspace.join(PAYLOAD_NAME)
    }

    pub fn remote_payload_path(&self) -> PathBuf {
        self.remote_workspace.join(PAYLOAD_NAME)
    }

    /// `cd '<ws>' && echo '<script> <payload>' | <submit>`
    pub fn submit_command_for(&self, script: &str) -> String {
        let invocation = format!("{script} {}", self.remote_payload_path().display());
        format!(
            "cd {} && echo {} | {}",
            shell_quote(&self.remote_workspace.display().to_string()),
            shell_quote(&invocation),
            self.submit_command
        )
    }
}

/// Run the pipeline for `request` and return the submission output.
pub fn execute_script<T: Transport>(
    transport: &T,
    request: &ExecutionRequest,
) -> Result<String, QaasError> {
    fs::create_dir_all(&request.staging_dir)
        .map_err(|e| QaasError::workspace(&request.staging_dir, e))?;

    let staged = stage_credential(&request.private_key, &request.staging_dir)?;
    debug!(staged = %staged.path().display(), "Credential staged");

    let target = request
        .relay
        .dial_target(request.owner.user(), staged.path().to_path_buf());
    let connection = transport.dial(&target)?;
    let result = deliver_and_submit(transport, &connection, request);
    transport.close_connection(connection);

    let output = result?;
    info!(
        identifier = %request.identifier,
        owner = %request.owner,
        output = %output,
        "Job submitted"
    );
    Ok(output)
}

fn deliver_and_submit<T: Transport>(
    transport: &T,
    connection: &T::Connection,
    request: &ExecutionRequest,
) -> Result<String, QaasError> {
    write_payload(request)?;

    let mut session = transport.open_session(connection)?;
    let submitted = read_script_pointer(&request.script_pointer()).and_then(|script| {
        let command = request.submit_command_for(&script);
        debug!(%command, "Submitting job");
        Ok(transport.combined_output(&mut session, &command)?)
    });
    let closed = transport.close_session(session);

    let output = submitted?;
    closed?;
    Ok(String::from_utf8_lossy(&output).trim().to_string())
}

/// Copy the private key into a fresh owner-only file under `staging_dir`.
/// The copy is deleted when the returned handle drops.
fn stage_credential(private_key: &Path, staging_dir: &Path) -> Result<NamedTempFile, QaasError> {
    let credential = |path: &Path, source: io::Error| {
        QaasError::Credential(KeyError::Io {
            path: path.to_path_buf(),
            source,
        })
    };

    let mut source = fs::File::open(private_key).map_err(|e| credential(private_key, e))?;
    let mut staged = tempfile::Builder::new()
        .prefix("id_rsa.")
        .tempfile_in(staging_dir)
        .map_err(|e| credential(staging_dir, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staged.path(), fs::Permissions::from_mode(0o600))
            .map_err(|e| credential(staged.path(), e))?;
    }

    io::copy(&mut source, staged.as_file_mut()).map_err(|e| credential(private_key, e))?;
    Ok(staged)
}

fn write_payload(request: &ExecutionRequest) -> Result<(), QaasError> {
    fs::create_dir_all(&request.workspace)
        .map_err(|e| QaasError::workspace(&request.workspace, e))?;
    let path = request.payload_path();
    fs::write(&path, &request.payload).map_err(|e| QaasError::workspace(&path, e))?;
    debug!(path = %path.display(), bytes = request.payload.len(), "Payload written");
    Ok(())
}

/// First non-empty line of the pointer file.
fn read_script_pointer(path: &Path) -> Result<String, QaasError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Missing::ScriptPointer(path.to_path_buf()).into());
        }
        Err(e) => return Err(QaasError::workspace(path, e)),
    };
    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Missing::ScriptPointer(path.to_path_buf()).into())
}
