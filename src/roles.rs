//! Role CRUD. Grant-set changes go through the propagator inside the same transaction.

use std::collections::BTreeSet;

use tracing::info;
use uuid::Uuid;

use crate::db::{now_ms, Store};
use crate::error::Result;
use crate::model::{NewRole, PageRequest, Paged, Role, RoleFilter, RoleInfo, RoleUpdate};
use crate::overlay::{overlay, RoleMenuNode};
use crate::propagate;
use crate::read;
use crate::tx::Tx;
use crate::validate;

/// Deduplicate requested endpoint ids, requiring each to be a live endpoint
fn resolve_grants(tx: &Tx, path_ids: &[String]) -> Result<BTreeSet<String>> {
    let mut grants = BTreeSet::new();
    for id in path_ids {
        read::get_path(tx.dbs(), tx.ro(), id)?;
        grants.insert(id.clone());
    }
    Ok(grants)
}

impl Store {
    pub fn add_role(&self, input: NewRole) -> Result<Role> {
        let name = validate::name("role name", &input.name)?;
        let description = validate::text("description", &input.description)?;
        let remark = validate::text("remark", &input.remark)?;
        let now = now_ms();
        let role = Role {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            status: input.status,
            remark,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.transact(|tx| {
            let grants = resolve_grants(tx, &input.path_ids)?;
            tx.claim_role_name(&role.name, &role.id)?;
            tx.put_role(&role)?;
            propagate::on_role_created(tx, &role.id, &grants)
        })?;
        info!(role_id = %role.id, name = %role.name, "role added");
        Ok(role)
    }

    /// Apply the set fields of `update`. `path_ids: Some(..)` replaces the whole grant set and
    /// invalidates every holder when it differs from the current one.
    pub fn edit_role(&self, role_id: &str, update: RoleUpdate) -> Result<Role> {
        let name = update.name.as_deref().map(|n| validate::name("role name", n)).transpose()?;
        let description = update.description.as_deref().map(|d| validate::text("description", d)).transpose()?;
        let remark = update.remark.as_deref().map(|r| validate::text("remark", r)).transpose()?;

        let (role, affected) = self.transact(|tx| {
            let mut role = read::get_role(tx.dbs(), tx.ro(), role_id)?;
            if let Some(name) = name {
                if name != role.name {
                    tx.release_role_name(&role.name, &role.id)?;
                    tx.claim_role_name(&name, &role.id)?;
                    role.name = name;
                }
            }
            if let Some(d) = description {
                role.description = d;
            }
            if let Some(r) = remark {
                role.remark = r;
            }
            let status_changed = matches!(update.status, Some(s) if s != role.status);
            if let Some(s) = update.status {
                role.status = s;
            }
            role.updated_at = now_ms();
            tx.put_role(&role)?;

            let mut affected = BTreeSet::new();
            if let Some(ids) = &update.path_ids {
                let grants = resolve_grants(tx, ids)?;
                affected.extend(propagate::on_role_grants_changed(tx, &role.id, &grants)?);
            }
            if status_changed {
                affected.extend(propagate::on_role_status_changed(tx, &role.id)?);
            }
            Ok((role, affected))
        })?;
        info!(role_id, affected = affected.len(), "role edited");
        Ok(role)
    }

    /// Soft-delete a role, unassigning it from every holder. Returns the affected users.
    pub fn delete_role(&self, role_id: &str) -> Result<Vec<String>> {
        let affected = self.transact(|tx| propagate::on_role_deleted(tx, role_id))?;
        info!(role_id, affected = affected.len(), "role deleted");
        Ok(affected)
    }

    /// Role record plus the full menu tree annotated with its grants
    pub fn role_info(&self, role_id: &str) -> Result<RoleInfo> {
        self.read(|d, tx| {
            let role = read::get_role(d, tx, role_id)?;
            let granted = read::granted_path_ids(d, tx, role_id)?;
            let forest = crate::menus::forest(d, tx)?;
            Ok(RoleInfo { role, menu_data: overlay(&forest.roots, &granted) })
        })
    }

    pub fn get_role_permission_tree(&self, role_id: &str) -> Result<Vec<RoleMenuNode>> {
        Ok(self.role_info(role_id)?.menu_data)
    }

    /// Live roles matching `filter`, newest first
    pub fn list_roles(&self, filter: &RoleFilter, page: PageRequest) -> Result<Paged<Role>> {
        let mut roles = self.read(|d, tx| read::list_live(&d.roles, tx))?;
        roles.retain(|r| filter.matches(r));
        roles.reverse();
        Ok(page.apply(roles))
    }
}
