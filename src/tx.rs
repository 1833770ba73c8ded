//! Write transaction wrapper: record writes, unique indexes and association rows

use std::collections::BTreeSet;

use heed::{RoTxn, RwTxn};

use crate::constants::{FIELD_EMAIL, FIELD_PHONE, FIELD_USERNAME};
use crate::db::{now_ms, Assoc, Dbs, IndexDb};
use crate::error::{err, PathbitError, Result};
use crate::keys::{route_key, unique_key};
use crate::model::{Admin, EffectivePermissions, Menu, Path, Role, User};

/// One LMDB write transaction. Dropping it without commit aborts every write.
pub struct Tx<'s> {
    txn: RwTxn<'s>,
    dbs: &'s Dbs,
}

impl<'s> Tx<'s> {
    #[inline]
    pub(crate) fn new(txn: RwTxn<'s>, dbs: &'s Dbs) -> Self {
        Tx { txn, dbs }
    }

    #[inline]
    pub fn dbs(&self) -> &'s Dbs {
        self.dbs
    }

    /// Read view of this transaction, including its uncommitted writes
    #[inline]
    pub fn ro(&self) -> &RoTxn<'s> {
        &self.txn
    }

    #[inline]
    pub(crate) fn commit(self) -> Result<()> {
        self.txn.commit().map_err(err)
    }

    pub(crate) fn clear(&mut self) -> Result<()> {
        let d = self.dbs;
        let t = &mut self.txn;
        d.menus.clear(t).map_err(err)?;
        d.paths.clear(t).map_err(err)?;
        d.roles.clear(t).map_err(err)?;
        d.users.clear(t).map_err(err)?;
        d.admins.clear(t).map_err(err)?;
        d.routes.clear(t).map_err(err)?;
        d.role_names.clear(t).map_err(err)?;
        d.user_keys.clear(t).map_err(err)?;
        d.admin_keys.clear(t).map_err(err)?;
        d.role_paths.fwd.clear(t).map_err(err)?;
        d.role_paths.rev.clear(t).map_err(err)?;
        d.user_roles.fwd.clear(t).map_err(err)?;
        d.user_roles.rev.clear(t).map_err(err)?;
        d.perms.clear(t).map_err(err)
    }

    // ========================================================================
    // Records
    // ========================================================================

    pub fn put_menu(&mut self, menu: &Menu) -> Result<()> {
        self.dbs.menus.put(&mut self.txn, &menu.id, menu).map_err(err)
    }

    pub fn put_path(&mut self, path: &Path) -> Result<()> {
        self.dbs.paths.put(&mut self.txn, &path.id, path).map_err(err)
    }

    pub fn put_role(&mut self, role: &Role) -> Result<()> {
        self.dbs.roles.put(&mut self.txn, &role.id, role).map_err(err)
    }

    pub fn put_user(&mut self, user: &User) -> Result<()> {
        self.dbs.users.put(&mut self.txn, &user.id, user).map_err(err)
    }

    pub fn put_admin(&mut self, admin: &Admin) -> Result<()> {
        self.dbs.admins.put(&mut self.txn, &admin.id, admin).map_err(err)
    }

    // ========================================================================
    // Unique indexes
    // ========================================================================

    /// Map `key` to `id`, failing with Conflict when another id already owns it
    fn claim(&mut self, db: IndexDb, key: &[u8], id: &str, what: &str) -> Result<()> {
        match db.get(&self.txn, key).map_err(err)? {
            Some(owner) if owner != id => Err(PathbitError::Conflict(format!("{} already exists", what))),
            Some(_) => Ok(()),
            None => db.put(&mut self.txn, key, id).map_err(err),
        }
    }

    /// Drop `key` only while it still points at `id`
    fn release(&mut self, db: IndexDb, key: &[u8], id: &str) -> Result<()> {
        if db.get(&self.txn, key).map_err(err)? == Some(id) {
            db.delete(&mut self.txn, key).map_err(err)?;
        }
        Ok(())
    }

    pub fn claim_role_name(&mut self, name: &str, role_id: &str) -> Result<()> {
        self.claim(self.dbs.role_names, name.as_bytes(), role_id, &format!("role name '{}'", name))
    }

    pub fn release_role_name(&mut self, name: &str, role_id: &str) -> Result<()> {
        self.release(self.dbs.role_names, name.as_bytes(), role_id)
    }

    pub fn claim_route(&mut self, method: &str, pattern: &str, path_id: &str) -> Result<()> {
        let key = route_key(method, pattern)?;
        self.claim(self.dbs.routes, &key, path_id, &format!("route {} {}", method, pattern))
    }

    pub fn release_route(&mut self, method: &str, pattern: &str, path_id: &str) -> Result<()> {
        let key = route_key(method, pattern)?;
        self.release(self.dbs.routes, &key, path_id)
    }

    /// Claim username, email and phone of a user. Empty email/phone are not indexed.
    pub fn claim_user_keys(&mut self, user: &User) -> Result<()> {
        self.claim_identity(self.dbs.user_keys, &user.id, &user.username, &user.email, &user.phone)
    }

    pub fn release_user_keys(&mut self, user: &User) -> Result<()> {
        self.release_identity(self.dbs.user_keys, &user.id, &user.username, &user.email, &user.phone)
    }

    pub fn claim_admin_keys(&mut self, admin: &Admin) -> Result<()> {
        self.claim_identity(self.dbs.admin_keys, &admin.id, &admin.username, &admin.email, &admin.phone)
    }

    pub fn release_admin_keys(&mut self, admin: &Admin) -> Result<()> {
        self.release_identity(self.dbs.admin_keys, &admin.id, &admin.username, &admin.email, &admin.phone)
    }

    fn claim_identity(&mut self, db: IndexDb, id: &str, username: &str, email: &str, phone: &str) -> Result<()> {
        for (field, value) in [(FIELD_USERNAME, username), (FIELD_EMAIL, email), (FIELD_PHONE, phone)] {
            if value.is_empty() {
                continue;
            }
            self.claim(db, &unique_key(field, value)?, id, &format!("{} '{}'", field, value))?;
        }
        Ok(())
    }

    fn release_identity(&mut self, db: IndexDb, id: &str, username: &str, email: &str, phone: &str) -> Result<()> {
        for (field, value) in [(FIELD_USERNAME, username), (FIELD_EMAIL, email), (FIELD_PHONE, phone)] {
            if value.is_empty() {
                continue;
            }
            self.release(db, &unique_key(field, value)?, id)?;
        }
        Ok(())
    }

    // ========================================================================
    // Associations
    // ========================================================================

    /// Make the members of `owner` exactly `members`. Rows present on both sides keep
    /// their epoch. Returns whether any row changed.
    fn replace_assoc(&mut self, assoc: &Assoc, owner: &str, members: &BTreeSet<String>) -> Result<bool> {
        let current: BTreeSet<String> = assoc
            .list_fwd(&self.txn, owner)?
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        let epoch = now_ms();
        let mut changed = false;
        for gone in current.difference(members) {
            assoc.del(&mut self.txn, owner, gone)?;
            changed = true;
        }
        for added in members.difference(&current) {
            assoc.put(&mut self.txn, owner, added, epoch)?;
            changed = true;
        }
        Ok(changed)
    }

    fn remove_assoc_fwd(&mut self, assoc: &Assoc, owner: &str) -> Result<Vec<String>> {
        let members: Vec<String> = assoc.list_fwd(&self.txn, owner)?.into_iter().map(|(m, _)| m).collect();
        for m in &members {
            assoc.del(&mut self.txn, owner, m)?;
        }
        Ok(members)
    }

    fn remove_assoc_rev(&mut self, assoc: &Assoc, member: &str) -> Result<Vec<String>> {
        let owners: Vec<String> = assoc.list_rev(&self.txn, member)?.into_iter().map(|(o, _)| o).collect();
        for o in &owners {
            assoc.del(&mut self.txn, o, member)?;
        }
        Ok(owners)
    }

    /// Replace the Role↔Path rows of `role_id`
    pub fn replace_role_paths(&mut self, role_id: &str, path_ids: &BTreeSet<String>) -> Result<bool> {
        let d = self.dbs;
        self.replace_assoc(&d.role_paths, role_id, path_ids)
    }

    /// Remove every Role↔Path row of `role_id`, returning the revoked path ids
    pub fn remove_role_paths(&mut self, role_id: &str) -> Result<Vec<String>> {
        let d = self.dbs;
        self.remove_assoc_fwd(&d.role_paths, role_id)
    }

    /// Remove `path_id` from every role granting it, returning those role ids
    pub fn remove_path_grants(&mut self, path_id: &str) -> Result<Vec<String>> {
        let d = self.dbs;
        self.remove_assoc_rev(&d.role_paths, path_id)
    }

    /// Replace the User↔Role rows of `user_id`
    pub fn replace_user_roles(&mut self, user_id: &str, role_ids: &BTreeSet<String>) -> Result<bool> {
        let d = self.dbs;
        self.replace_assoc(&d.user_roles, user_id, role_ids)
    }

    pub fn remove_user_roles(&mut self, user_id: &str) -> Result<Vec<String>> {
        let d = self.dbs;
        self.remove_assoc_fwd(&d.user_roles, user_id)
    }

    /// Unassign `role_id` from every user, returning those user ids
    pub fn remove_role_holders(&mut self, role_id: &str) -> Result<Vec<String>> {
        let d = self.dbs;
        self.remove_assoc_rev(&d.user_roles, role_id)
    }

    // ========================================================================
    // Effective permission records (written by the propagate module only)
    // ========================================================================

    pub(crate) fn invalidate_user_permissions(&mut self, user_id: &str) -> Result<bool> {
        self.dbs.perms.delete(&mut self.txn, user_id).map_err(err)
    }

    pub(crate) fn store_user_permissions(&mut self, perms: &EffectivePermissions) -> Result<()> {
        self.dbs.perms.put(&mut self.txn, &perms.user_id, perms).map_err(err)
    }
}
