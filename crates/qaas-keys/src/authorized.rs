//! Installing a public key into an account's `authorized_keys`.
//!
//! Appends are de-duplicated: a key already listed (same type and key blob,
//! whatever its comment) is not appended again.

use std::io::Write;
use std::path::Path;

use qaas_core::Owner;
use qaas_transport::{DialTarget, Transport, shell_quote};
use tracing::{debug, info};

use crate::error::KeyError;

/// Where the owner's `authorized_keys` lives.
pub enum AuthorizedKeysTarget<'a, T: Transport> {
    /// Home directories are mounted locally at `<home_dir>/<group>/<user>`.
    Local { home_dir: &'a Path },
    /// Reach the account over the transport and edit the file there.
    Remote {
        transport: &'a T,
        target: DialTarget,
    },
}

/// Read the single `authorized_keys` line from a public key file.
pub fn read_public_key_line(path: &Path) -> Result<String, KeyError> {
    let content = std::fs::read_to_string(path).map_err(|e| KeyError::io(path, e))?;
    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .ok_or_else(|| KeyError::EmptyPublicKey(path.to_path_buf()))
}

/// Authorize the key in `public_key_path` for `owner`.
pub fn add_authorized_key<T: Transport>(
    target: AuthorizedKeysTarget<'_, T>,
    owner: &Owner,
    public_key_path: &Path,
) -> Result<(), KeyError> {
    let line = read_public_key_line(public_key_path)?;
    match target {
        AuthorizedKeysTarget::Local { home_dir } => {
            let account_home = owner.dir_in(home_dir);
            let appended = append_local(&account_home, &line)?;
            info!(%owner, appended, "Authorized key installed on shared home");
            Ok(())
        }
        AuthorizedKeysTarget::Remote { transport, target } => {
            append_remote(transport, &target, &line)?;
            info!(%owner, host = %target.host, "Authorized key installed on relay node");
            Ok(())
        }
    }
}

/// Returns `true` if the line was appended, `false` if already present.
fn append_local(account_home: &Path, line: &str) -> Result<bool, KeyError> {
    let ssh_dir = account_home.join(".ssh");
    std::fs::create_dir_all(&ssh_dir).map_err(|e| KeyError::io(&ssh_dir, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&ssh_dir, std::fs::Permissions::from_mode(0o700))
            .map_err(|e| KeyError::io(&ssh_dir, e))?;
    }

    let path = ssh_dir.join("authorized_keys");
    let existing = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(KeyError::io(&path, e)),
    };
    if existing.lines().any(|l| same_key(l, line)) {
        debug!(path = %path.display(), "Key already authorized");
        return Ok(false);
    }

    let mut options = std::fs::OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&path).map_err(|e| KeyError::io(&path, e))?;

    let mut entry = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        entry.push('\n');
    }
    entry.push_str(line);
    entry.push('\n');
    file.write_all(entry.as_bytes())
        .map_err(|e| KeyError::io(&path, e))?;
    Ok(true)
}

fn append_remote<T: Transport>(
    transport: &T,
    target: &DialTarget,
    line: &str,
) -> Result<(), KeyError> {
    let quoted = shell_quote(line);
    let command = format!(
        "umask 077 && mkdir -p ~/.ssh && touch ~/.ssh/authorized_keys && \
         (grep -qxF {quoted} ~/.ssh/authorized_keys || echo {quoted} >> ~/.ssh/authorized_keys)"
    );

    let connection = transport.dial(target)?;
    let result = (|| {
        let mut session = transport.open_session(&connection)?;
        let run = transport.run(&mut session, &command);
        transport.close_session(session)?;
        run
    })();
    transport.close_connection(connection);
    Ok(result?)
}

/// Compare key type and blob, ignoring options-free comment differences.
pub(crate) fn same_key(a: &str, b: &str) -> bool {
    let mut a = a.split_whitespace();
    let mut b = b.split_whitespace();
    match (a.next(), a.next(), b.next(), b.next()) {
        (Some(ta), Some(ka), Some(tb), Some(kb)) => ta == tb && ka == kb,
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use qaas_transport::{Auth, NoopTransport, TransportCall};

    use super::*;

    const KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQC7 qaas-dccngroup-dccnuser";

    fn owner() -> Owner {
        Owner::new("dccngroup", "dccnuser").unwrap()
    }

    fn write_public_key(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("id_rsa.pub");
        std::fs::write(&path, format!("{KEY}\n")).unwrap();
        path
    }

    #[test]
    fn local_append_creates_ssh_dir_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        let public = write_public_key(dir.path());

        add_authorized_key::<NoopTransport>(
            AuthorizedKeysTarget::Local { home_dir: &home },
            &owner(),
            &public,
        )
        .unwrap();

        let authorized = home.join("dccngroup/dccnuser/.ssh/authorized_keys");
        assert_eq!(
            std::fs::read_to_string(authorized).unwrap(),
            format!("{KEY}\n")
        );
    }

    #[test]
    fn local_append_is_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        let public = write_public_key(dir.path());

        for _ in 0..3 {
            add_authorized_key::<NoopTransport>(
                AuthorizedKeysTarget::Local { home_dir: &home },
                &owner(),
                &public,
            )
            .unwrap();
        }

        let content =
            std::fs::read_to_string(home.join("dccngroup/dccnuser/.ssh/authorized_keys")).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn local_append_keeps_existing_keys_and_fixes_missing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        let ssh_dir = home.join("dccngroup/dccnuser/.ssh");
        std::fs::create_dir_all(&ssh_dir).unwrap();
        std::fs::write(ssh_dir.join("authorized_keys"), "ssh-ed25519 AAAAC3 laptop").unwrap();
        let public = write_public_key(dir.path());

        add_authorized_key::<NoopTransport>(
            AuthorizedKeysTarget::Local { home_dir: &home },
            &owner(),
            &public,
        )
        .unwrap();

        let content = std::fs::read_to_string(ssh_dir.join("authorized_keys")).unwrap();
        assert_eq!(content, format!("ssh-ed25519 AAAAC3 laptop\n{KEY}\n"));
    }

    #[test]
    fn remote_append_runs_one_guarded_command() {
        let dir = tempfile::tempdir().unwrap();
        let public = write_public_key(dir.path());
        let transport = NoopTransport::recording();

        add_authorized_key(
            AuthorizedKeysTarget::Remote {
                transport: &transport,
                target: DialTarget {
                    host: "relaynode.dccn.nl".into(),
                    port: 22,
                    username: "dccnuser".into(),
                    auth: Auth::Password("somepassword".into()),
                },
            },
            &owner(),
            &public,
        )
        .unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[1], TransportCall::OpenSession);
        match &calls[2] {
            TransportCall::Run(cmd) => {
                assert!(cmd.contains("grep -qxF"), "{cmd}");
                assert!(cmd.contains(KEY), "{cmd}");
            }
            other => panic!("unexpected call {other:?}"),
        }
        assert_eq!(calls[4], TransportCall::CloseConnection);
    }

    #[test]
    fn empty_public_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_rsa.pub");
        std::fs::write(&path, "\n\n").unwrap();

        assert!(matches!(
            read_public_key_line(&path),
            Err(KeyError::EmptyPublicKey(_))
        ));
    }

    #[test]
    fn same_key_ignores_comment() {
        assert!(same_key("ssh-rsa AAAA one", "ssh-rsa AAAA two"));
        assert!(!same_key("ssh-rsa AAAA", "ssh-rsa BBBB"));
        assert!(!same_key("", "ssh-rsa AAAA"));
    }
}
