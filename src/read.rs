//! Read helpers over a read or write transaction (no side effects)

use std::collections::BTreeSet;

use heed::RoTxn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::{Dbs, Records};
use crate::error::{err, PathbitError, Result};
use crate::constants::FIELD_USERNAME;
use crate::keys::{route_key, unique_key};
use crate::model::{Admin, EffectivePermissions, Menu, Path, Record, Role, User};

/// Every live record of `db`, oldest first (created_at, then id)
pub(crate) fn list_live<T>(db: &Records<T>, tx: &RoTxn) -> Result<Vec<T>>
where
    T: Record + Serialize + DeserializeOwned + 'static,
{
    let mut out = Vec::new();
    for item in db.iter(tx).map_err(err)? {
        let (_, rec) = item.map_err(err)?;
        if rec.is_live() {
            out.push(rec);
        }
    }
    out.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then_with(|| a.id().cmp(b.id())));
    Ok(out)
}

/// Live record by id, `NotFound` when missing or soft-deleted
fn get_live<T>(db: &Records<T>, tx: &RoTxn, kind: &'static str, id: &str) -> Result<T>
where
    T: Record + Serialize + DeserializeOwned + 'static,
{
    match db.get(tx, id).map_err(err)? {
        Some(rec) if rec.is_live() => Ok(rec),
        _ => Err(PathbitError::not_found(kind, id)),
    }
}

pub fn list_menus(d: &Dbs, tx: &RoTxn) -> Result<Vec<Menu>> {
    list_live(&d.menus, tx)
}

pub fn list_paths(d: &Dbs, tx: &RoTxn) -> Result<Vec<Path>> {
    list_live(&d.paths, tx)
}

pub fn get_menu(d: &Dbs, tx: &RoTxn, id: &str) -> Result<Menu> {
    get_live(&d.menus, tx, "menu", id)
}

pub fn get_path(d: &Dbs, tx: &RoTxn, id: &str) -> Result<Path> {
    get_live(&d.paths, tx, "path", id)
}

pub fn get_role(d: &Dbs, tx: &RoTxn, id: &str) -> Result<Role> {
    get_live(&d.roles, tx, "role", id)
}

pub fn get_user(d: &Dbs, tx: &RoTxn, id: &str) -> Result<User> {
    get_live(&d.users, tx, "user", id)
}

pub fn get_admin(d: &Dbs, tx: &RoTxn, id: &str) -> Result<Admin> {
    get_live(&d.admins, tx, "admin", id)
}

/// Endpoint ids granted to a role
pub fn granted_path_ids(d: &Dbs, tx: &RoTxn, role_id: &str) -> Result<BTreeSet<String>> {
    Ok(d.role_paths.list_fwd(tx, role_id)?.into_iter().map(|(p, _)| p).collect())
}

/// Users currently assigned `role_id`
pub fn user_ids_holding_role(d: &Dbs, tx: &RoTxn, role_id: &str) -> Result<Vec<String>> {
    Ok(d.user_roles.list_rev(tx, role_id)?.into_iter().map(|(u, _)| u).collect())
}

pub fn roles_held_by_user(d: &Dbs, tx: &RoTxn, user_id: &str) -> Result<Vec<String>> {
    Ok(d.user_roles.list_fwd(tx, user_id)?.into_iter().map(|(r, _)| r).collect())
}

pub fn role_ids_granting_path(d: &Dbs, tx: &RoTxn, path_id: &str) -> Result<Vec<String>> {
    Ok(d.role_paths.list_rev(tx, path_id)?.into_iter().map(|(r, _)| r).collect())
}

/// Endpoint id registered for an exact `(method, pattern)` pair
pub fn lookup_route(d: &Dbs, tx: &RoTxn, method: &str, pattern: &str) -> Result<Option<String>> {
    // overlong parts can never have been registered
    let Ok(key) = route_key(&method.to_ascii_uppercase(), pattern) else {
        return Ok(None);
    };
    Ok(d.routes.get(tx, &key).map_err(err)?.map(str::to_string))
}

/// Materialized permissions, `None` when invalidated or never computed
pub fn cached_permissions(d: &Dbs, tx: &RoTxn, user_id: &str) -> Result<Option<EffectivePermissions>> {
    d.perms.get(tx, user_id).map_err(err)
}

/// Live admin registered under `username`
pub fn admin_by_username(d: &Dbs, tx: &RoTxn, username: &str) -> Result<Option<Admin>> {
    let Ok(key) = unique_key(FIELD_USERNAME, username) else {
        return Ok(None);
    };
    match d.admin_keys.get(tx, &key).map_err(err)? {
        Some(id) => match get_admin(d, tx, id) {
            Ok(admin) => Ok(Some(admin)),
            Err(PathbitError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        },
        None => Ok(None),
    }
}
