//! Key material management.
//!
//! Every webhook owner gets an RSA key pair under the service's key
//! directory. The public half is appended to the owner's `authorized_keys`
//! so the service can reach the relay node as that user; the private half
//! never leaves the service host except as a short-lived staged copy.

mod authorized;
mod error;
mod keypair;

pub use authorized::{AuthorizedKeysTarget, add_authorized_key, read_public_key_line};
pub use error::KeyError;
pub use keypair::{
    KeyPairPaths, RSA_KEY_BITS, ensure_key_pair, generate_key_pair, key_pair_matches,
};
