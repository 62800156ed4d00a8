//! The invoking Unix account as a webhook owner.

use anyhow::Context;
use nix::unistd::{Group, Uid, User};
use qaas_core::Owner;

/// Current user and primary group.
pub fn current_owner() -> anyhow::Result<Owner> {
    let uid = Uid::current();
    let user = User::from_uid(uid)
        .context("looking up current user")?
        .with_context(|| format!("no passwd entry for uid {uid}"))?;
    let group = Group::from_gid(user.gid)
        .context("looking up primary group")?
        .with_context(|| format!("no group entry for gid {}", user.gid))?;
    Ok(Owner::new(group.name, user.name)?)
}
