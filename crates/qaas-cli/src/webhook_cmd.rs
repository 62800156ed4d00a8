//! Webhook subcommands: new, list, info, delete, trigger.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use qaas_core::{Owner, SCRIPT_POINTER_NAME, WORKSPACE_DIR};
use tracing::debug;

use crate::client::{ApiClient, WebhookInfo};

/// Webhook subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum WebhookAction {
    /// Create a webhook that runs SCRIPT on the cluster.
    New {
        /// Script submitted as a job on every delivery.
        script: PathBuf,
        /// Free-form description.
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List your webhooks.
    List,
    /// Show one webhook.
    Info { id: String },
    /// Delete a webhook.
    Delete {
        id: String,
        /// Also remove the webhook's workspace directory.
        #[arg(long)]
        remove_dir: bool,
    },
    /// Deliver a payload to a webhook, as an external service would.
    Trigger {
        id: String,
        /// File whose contents are sent as the payload (`-` for stdin).
        #[arg(long)]
        data: Option<PathBuf>,
        #[arg(long, default_value = "application/json")]
        content_type: String,
    },
}

/// Execute a webhook subcommand.
pub async fn run(
    action: WebhookAction,
    client: &ApiClient,
    owner: &Owner,
    home: &Path,
) -> anyhow::Result<()> {
    let mut out = io::stdout();
    match action {
        WebhookAction::New {
            script,
            description,
        } => {
            let id = uuid::Uuid::new_v4().to_string();
            let workspace = create_workspace(home, &id, &script)?;
            match client.register(&id, owner, description.as_deref()).await {
                Ok(url) => writeln!(out, "{url}")?,
                Err(e) => {
                    std::fs::remove_dir_all(&workspace).ok();
                    return Err(e.into());
                }
            }
        }
        WebhookAction::List => {
            let webhooks = client.list(owner).await?;
            if webhooks.is_empty() {
                writeln!(out, "No webhooks registered")?;
            }
            for webhook in &webhooks {
                writeln!(out, "{}", format_webhook(webhook))?;
            }
        }
        WebhookAction::Info { id } => {
            let webhook = client.info(&id).await?;
            writeln!(out, "{}", format_webhook(&webhook))?;
        }
        WebhookAction::Delete { id, remove_dir } => {
            client.delete(&id, owner).await?;
            writeln!(out, "Deleted webhook {id}")?;
            if remove_dir {
                let dir = workspace_dir(home, &id);
                std::fs::remove_dir_all(&dir)
                    .with_context(|| format!("removing {}", dir.display()))?;
            }
        }
        WebhookAction::Trigger {
            id,
            data,
            content_type,
        } => {
            let payload = read_payload(data.as_deref())?;
            let response = client.trigger(&id, payload, &content_type).await?;
            writeln!(out, "{response}")?;
        }
    }
    Ok(())
}

/// `~/.qaas/<id>`
pub fn workspace_dir(home: &Path, id: &str) -> PathBuf {
    home.join(WORKSPACE_DIR).join(id)
}

/// Create the owner-only workspace for `id` with a pointer to `script`.
pub fn create_workspace(home: &Path, id: &str, script: &Path) -> anyhow::Result<PathBuf> {
    let script = script
        .canonicalize()
        .with_context(|| format!("script {} not found", script.display()))?;
    anyhow::ensure!(script.is_file(), "{} is not a file", script.display());

    let workspace = workspace_dir(home, id);
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(&workspace)
        .with_context(|| format!("creating {}", workspace.display()))?;

    let pointer = workspace.join(SCRIPT_POINTER_NAME);
    std::fs::write(&pointer, format!("{}\n", script.display()))
        .with_context(|| format!("writing {}", pointer.display()))?;
    debug!(workspace = %workspace.display(), script = %script.display(), "Workspace created");
    Ok(workspace)
}

fn read_payload(data: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    match data {
        None => Ok(Vec::new()),
        Some(path) if path == Path::new("-") => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
        Some(path) => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))
        }
    }
}

pub fn format_webhook(webhook: &WebhookInfo) -> String {
    let description = if webhook.description.is_empty() {
        "-"
    } else {
        webhook.description.as_str()
    };
    format!(
        "{}  {}  {}\n  {}",
        webhook.hash, webhook.created, description, webhook.url
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ID: &str = "550e8400-e29b-41d4-a716-446655440001";

    #[test]
    fn create_workspace_writes_absolute_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("job.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();

        let ws = create_workspace(dir.path(), ID, &script).unwrap();

        assert_eq!(ws, dir.path().join(".qaas").join(ID));
        let pointer = std::fs::read_to_string(ws.join("script.sh")).unwrap();
        assert_eq!(
            pointer,
            format!("{}\n", script.canonicalize().unwrap().display())
        );
    }

    #[cfg(unix)]
    #[test]
    fn workspace_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("job.sh");
        std::fs::write(&script, "").unwrap();

        let ws = create_workspace(dir.path(), ID, &script).unwrap();
        let mode = std::fs::metadata(ws).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn missing_script_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(create_workspace(dir.path(), ID, &dir.path().join("nope.sh")).is_err());
        assert!(!workspace_dir(dir.path(), ID).exists());
    }

    #[test]
    fn directory_is_not_a_script() {
        let dir = tempfile::tempdir().unwrap();
        assert!(create_workspace(dir.path(), ID, dir.path()).is_err());
    }

    #[test]
    fn payload_defaults_to_empty_and_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("payload.json");
        std::fs::write(&file, "{\"a\":1}").unwrap();

        assert!(read_payload(None).unwrap().is_empty());
        assert_eq!(read_payload(Some(&file)).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn format_shows_dash_for_missing_description() {
        let webhook = WebhookInfo {
            hash: ID.into(),
            groupname: "g".into(),
            username: "u".into(),
            description: String::new(),
            created: "2026-01-01T00:00:00Z".into(),
            url: format!("https://h:5111/webhook/{ID}"),
        };
        let text = format_webhook(&webhook);
        assert!(text.starts_with(&format!("{ID}  2026-01-01T00:00:00Z  -")));
        assert!(text.ends_with(&webhook.url));
    }
}
