//! RSA key pair generation and persistence.

use std::io::Write;
use std::path::{Path, PathBuf};

use qaas_core::Owner;
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::authorized::{read_public_key_line, same_key};
use crate::error::KeyError;

/// Modulus size for generated keys.
pub const RSA_KEY_BITS: usize = 4096;

const PRIVATE_KEY_NAME: &str = "id_rsa";
const PUBLIC_KEY_NAME: &str = "id_rsa.pub";

/// Locations of a private key and its public counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairPaths {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

impl KeyPairPaths {
    /// `<dir>/id_rsa` and `<dir>/id_rsa.pub`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            private_key: dir.join(PRIVATE_KEY_NAME),
            public_key: dir.join(PUBLIC_KEY_NAME),
        }
    }

    /// `<keys_dir>/<group>/<user>/id_rsa{,.pub}`.
    pub fn for_owner(keys_dir: &Path, owner: &Owner) -> Self {
        Self::in_dir(&owner.dir_in(keys_dir))
    }

    /// Both halves present. A lone half counts as no pair at all.
    pub fn exists(&self) -> bool {
        self.private_key.is_file() && self.public_key.is_file()
    }
}

/// Generate a key pair unless a matching pair already exists.
///
/// A pair whose public half was not derived from its private half is
/// replaced. Returns `true` if a new pair was written.
pub fn ensure_key_pair(paths: &KeyPairPaths, bits: usize, comment: &str) -> Result<bool, KeyError> {
    if paths.exists() {
        if key_pair_matches(paths)? {
            return Ok(false);
        }
        warn!(
            private_key = %paths.private_key.display(),
            "Public key does not belong to private key, regenerating"
        );
    }
    generate_key_pair(paths, bits, comment)?;
    Ok(true)
}

/// Whether the public key file holds the key derived from the private key.
///
/// An unparseable private key counts as a mismatch.
pub fn key_pair_matches(paths: &KeyPairPaths) -> Result<bool, KeyError> {
    let pem = std::fs::read_to_string(&paths.private_key)
        .map_err(|e| KeyError::io(&paths.private_key, e))?;
    let Ok(private_key) = RsaPrivateKey::from_pkcs1_pem(&pem) else {
        return Ok(false);
    };
    let derived = authorized_key_line(&private_key.to_public_key(), "")?;
    let stored = match read_public_key_line(&paths.public_key) {
        Ok(line) => line,
        Err(KeyError::EmptyPublicKey(_)) => return Ok(false),
        Err(e) => return Err(e),
    };
    Ok(same_key(derived.trim(), &stored))
}

/// Generate an RSA key pair and write it to `paths`.
///
/// The private key is PKCS#1 PEM with mode 0600, the public key a single
/// `authorized_keys` line. Either both files are replaced or neither is.
pub fn generate_key_pair(paths: &KeyPairPaths, bits: usize, comment: &str) -> Result<(), KeyError> {
    let private_key =
        RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| KeyError::Generation(e.to_string()))?;
    private_key
        .validate()
        .map_err(|e| KeyError::Generation(e.to_string()))?;

    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| KeyError::Encoding(e.to_string()))?;
    let public_line = authorized_key_line(&private_key.to_public_key(), comment)?;

    write_pair(paths, private_pem.as_bytes(), public_line.as_bytes())?;

    info!(
        private_key = %paths.private_key.display(),
        public_key = %paths.public_key.display(),
        bits,
        "Key pair generated"
    );
    Ok(())
}

fn authorized_key_line(public_key: &rsa::RsaPublicKey, comment: &str) -> Result<String, KeyError> {
    let rsa_public = ssh_key::public::RsaPublicKey::try_from(public_key)
        .map_err(|e| KeyError::Encoding(e.to_string()))?;
    let line = ssh_key::PublicKey::new(ssh_key::public::KeyData::Rsa(rsa_public), comment)
        .to_openssh()
        .map_err(|e| KeyError::Encoding(e.to_string()))?;
    Ok(format!("{line}\n"))
}

fn write_pair(paths: &KeyPairPaths, private: &[u8], public: &[u8]) -> Result<(), KeyError> {
    let private_tmp = write_temp(&paths.private_key, private, 0o600)?;
    let public_tmp = write_temp(&paths.public_key, public, 0o644)?;

    private_tmp
        .persist(&paths.private_key)
        .map_err(|e| KeyError::io(&paths.private_key, e.error))?;
    if let Err(e) = public_tmp.persist(&paths.public_key) {
        std::fs::remove_file(&paths.private_key).ok();
        return Err(KeyError::io(&paths.public_key, e.error));
    }
    Ok(())
}

/// Write `data` to a temp file next to `dest`, ready to be renamed over it.
fn write_temp(dest: &Path, data: &[u8], mode: u32) -> Result<NamedTempFile, KeyError> {
    let dir = dest.parent().ok_or_else(|| {
        KeyError::io(
            dest,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent directory"),
        )
    })?;
    std::fs::create_dir_all(dir).map_err(|e| KeyError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| KeyError::io(dir, e))?;
    tmp.write_all(data).map_err(|e| KeyError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| KeyError::io(tmp.path(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(mode))
            .map_err(|e| KeyError::io(tmp.path(), e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(tmp)
}
