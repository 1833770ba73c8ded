//! Grant-change propagation.
//!
//! Every function here runs inside the caller's write transaction, so association changes, holder
//! resolution and invalidation commit together with the triggering write or not at all. This module
//! is the only writer of the materialized effective-permission records: mutations invalidate them,
//! and `materialize` rebuilds one on demand.

use std::collections::BTreeSet;

use tracing::debug;

use crate::db::now_ms;
use crate::error::{PathbitError, Result};
use crate::model::EffectivePermissions;
use crate::read;
use crate::tx::Tx;

/// Store the initial grant set of a new role. No user holds it yet.
pub fn on_role_created(tx: &mut Tx, role_id: &str, grants: &BTreeSet<String>) -> Result<()> {
    tx.replace_role_paths(role_id, grants)?;
    debug!(role_id, grants = grants.len(), "role grants created");
    Ok(())
}

/// Replace a role's grant set and invalidate every holder. Returns the invalidated users;
/// an identical grant set changes nothing and returns none.
pub fn on_role_grants_changed(tx: &mut Tx, role_id: &str, grants: &BTreeSet<String>) -> Result<Vec<String>> {
    regrant(tx, role_id, grants, invalidate)
}

pub(crate) fn regrant<F>(tx: &mut Tx, role_id: &str, grants: &BTreeSet<String>, mut invalidate: F) -> Result<Vec<String>>
where
    F: FnMut(&mut Tx, &str) -> Result<()>,
{
    if !tx.replace_role_paths(role_id, grants)? {
        debug!(role_id, "role grants unchanged");
        return Ok(Vec::new());
    }
    let users = read::user_ids_holding_role(tx.dbs(), tx.ro(), role_id)?;
    for user_id in &users {
        invalidate(tx, user_id)?;
    }
    debug!(role_id, affected = users.len(), "role grants replaced");
    Ok(users)
}

/// Unassign and invalidate every holder, revoke all grants, then soft-delete the role
/// and release its name. Returns the invalidated users.
pub fn on_role_deleted(tx: &mut Tx, role_id: &str) -> Result<Vec<String>> {
    let mut role = read::get_role(tx.dbs(), tx.ro(), role_id)?;
    let users = tx.remove_role_holders(role_id)?;
    for user_id in &users {
        invalidate(tx, user_id)?;
    }
    let revoked = tx.remove_role_paths(role_id)?;
    let now = now_ms();
    role.deleted_at = Some(now);
    role.updated_at = now;
    tx.put_role(&role)?;
    tx.release_role_name(&role.name, &role.id)?;
    debug!(role_id, affected = users.len(), revoked = revoked.len(), "role deleted");
    Ok(users)
}

/// Enabling or disabling a role changes every holder's union
pub fn on_role_status_changed(tx: &mut Tx, role_id: &str) -> Result<Vec<String>> {
    let users = read::user_ids_holding_role(tx.dbs(), tx.ro(), role_id)?;
    for user_id in &users {
        invalidate(tx, user_id)?;
    }
    debug!(role_id, affected = users.len(), "role status changed");
    Ok(users)
}

/// Replace the roles held by one user. Every role must exist. Returns whether anything changed.
pub fn on_user_roles_changed(tx: &mut Tx, user_id: &str, role_ids: &BTreeSet<String>) -> Result<bool> {
    for role_id in role_ids {
        read::get_role(tx.dbs(), tx.ro(), role_id)?;
    }
    let changed = tx.replace_user_roles(user_id, role_ids)?;
    if changed {
        invalidate(tx, user_id)?;
    }
    debug!(user_id, roles = role_ids.len(), changed, "user roles replaced");
    Ok(changed)
}

/// User enabled, disabled or otherwise changed in a way that affects its union
pub fn on_user_status_changed(tx: &mut Tx, user_id: &str) -> Result<()> {
    invalidate(tx, user_id)
}

/// Drop every role assignment of a deleted user along with its materialization
pub fn on_user_deleted(tx: &mut Tx, user_id: &str) -> Result<()> {
    let roles = tx.remove_user_roles(user_id)?;
    invalidate(tx, user_id)?;
    debug!(user_id, roles = roles.len(), "user unassigned");
    Ok(())
}

/// Revoke a deleted endpoint from every role and invalidate those roles' holders
pub fn on_path_deleted(tx: &mut Tx, path_id: &str) -> Result<Vec<String>> {
    let roles = tx.remove_path_grants(path_id)?;
    let mut users = BTreeSet::new();
    for role_id in &roles {
        users.extend(read::user_ids_holding_role(tx.dbs(), tx.ro(), role_id)?);
    }
    for user_id in &users {
        invalidate(tx, user_id)?;
    }
    debug!(path_id, roles = roles.len(), affected = users.len(), "endpoint revoked");
    Ok(users.into_iter().collect())
}

/// Recompute and store a user's effective permissions: the union of grants over the user's
/// enabled, live roles. A disabled user materializes an empty set.
pub fn materialize(tx: &mut Tx, user_id: &str) -> Result<EffectivePermissions> {
    let d = tx.dbs();
    let user = read::get_user(d, tx.ro(), user_id)?;
    let mut path_ids = BTreeSet::new();
    if user.status.is_enabled() {
        for role_id in read::roles_held_by_user(d, tx.ro(), user_id)? {
            match read::get_role(d, tx.ro(), &role_id) {
                Ok(role) if role.status.is_enabled() => {
                    path_ids.extend(read::granted_path_ids(d, tx.ro(), &role_id)?);
                }
                Ok(_) | Err(PathbitError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
    }
    let perms = EffectivePermissions { user_id: user_id.to_string(), path_ids, computed_at: now_ms() };
    tx.store_user_permissions(&perms)?;
    debug!(user_id, paths = perms.path_ids.len(), "effective permissions materialized");
    Ok(perms)
}

#[inline]
fn invalidate(tx: &mut Tx, user_id: &str) -> Result<()> {
    tx.invalidate_user_permissions(user_id).map(|_| ())
}
