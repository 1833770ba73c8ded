//! Menu and endpoint CRUD, plus the tree views built from them

use std::collections::HashSet;

use heed::RoTxn;
use tracing::info;
use uuid::Uuid;

use crate::db::{now_ms, Dbs, Store};
use crate::error::{PathbitError, Result};
use crate::model::{Menu, MenuUpdate, NewMenu, NewPath, Path, PathUpdate};
use crate::overlay::{overlay, RoleMenuNode};
use crate::propagate;
use crate::read;
use crate::tree::{build_tree, declared_parent, Forest, MenuNode};
use crate::validate;

/// Build the forest from one snapshot of live menus and endpoints
pub(crate) fn forest(d: &Dbs, tx: &RoTxn) -> Result<Forest> {
    build_tree(&read::list_menus(d, tx)?, &read::list_paths(d, tx)?)
}

/// Reject re-parenting `menu_id` under itself or one of its descendants. Walks parents up to a
/// root; a parent chain that loops without passing `menu_id` is reported as well.
fn no_cycle(d: &Dbs, tx: &RoTxn, menu_id: &str, new_parent: &str) -> Result<()> {
    if menu_id == new_parent {
        return Err(PathbitError::IntegrityViolation("menu cannot be its own parent".into()));
    }
    let mut seen = HashSet::new();
    let mut cur = new_parent.to_string();
    loop {
        let menu = read::get_menu(d, tx, &cur)?;
        match declared_parent(menu.parent_id.as_deref()) {
            Some(p) if p == menu_id => {
                return Err(PathbitError::IntegrityViolation(format!(
                    "moving menu {} under {} would create a cycle",
                    menu_id, new_parent
                )))
            }
            Some(p) => {
                if !seen.insert(cur) {
                    return Err(PathbitError::IntegrityViolation(format!(
                        "menu hierarchy contains a cycle through menu {}",
                        p
                    )));
                }
                cur = p.to_string();
            }
            None => return Ok(()),
        }
    }
}

/// Normalize a requested parent and require it to be a live menu
fn resolve_parent(d: &Dbs, tx: &RoTxn, parent_id: Option<&str>) -> Result<Option<String>> {
    match declared_parent(parent_id) {
        Some(p) => Ok(Some(read::get_menu(d, tx, p)?.id)),
        None => Ok(None),
    }
}

impl Store {
    // ========================================================================
    // Tree views
    // ========================================================================

    /// The plain menu hierarchy
    pub fn get_menu_tree(&self) -> Result<Vec<MenuNode>> {
        Ok(self.read(forest)?.roots)
    }

    /// The hierarchy with dangling-reference diagnostics
    pub fn get_menu_forest(&self) -> Result<Forest> {
        self.read(forest)
    }

    /// The hierarchy annotated with the user's effective permissions
    pub fn get_user_menu_tree(&self, user_id: &str) -> Result<Vec<RoleMenuNode>> {
        let granted = self.effective_permissions(user_id)?;
        let forest = self.read(forest)?;
        Ok(overlay(&forest.roots, &granted))
    }

    /// Only the menus and endpoints the user can reach
    pub fn get_user_accessible_menus(&self, user_id: &str) -> Result<Vec<RoleMenuNode>> {
        let tree = self.get_user_menu_tree(user_id)?;
        Ok(tree.iter().filter_map(RoleMenuNode::pruned).collect())
    }

    // ========================================================================
    // Menus
    // ========================================================================

    pub fn add_menu(&self, input: NewMenu) -> Result<Menu> {
        let name = validate::name("menu name", &input.name)?;
        let menu = self.transact(|tx| {
            let parent_id = resolve_parent(tx.dbs(), tx.ro(), input.parent_id.as_deref())?;
            let now = now_ms();
            let menu = Menu {
                id: Uuid::new_v4().to_string(),
                parent_id,
                name,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            tx.put_menu(&menu)?;
            Ok(menu)
        })?;
        info!(menu_id = %menu.id, "menu added");
        Ok(menu)
    }

    pub fn edit_menu(&self, menu_id: &str, update: MenuUpdate) -> Result<Menu> {
        let name = update.name.as_deref().map(|n| validate::name("menu name", n)).transpose()?;
        let menu = self.transact(|tx| {
            let (d, ro) = (tx.dbs(), tx.ro());
            let mut menu = read::get_menu(d, ro, menu_id)?;
            if let Some(parent) = &update.parent_id {
                let parent_id = resolve_parent(d, ro, parent.as_deref())?;
                if let Some(p) = &parent_id {
                    no_cycle(d, ro, menu_id, p)?;
                }
                menu.parent_id = parent_id;
            }
            if let Some(n) = name {
                menu.name = n;
            }
            menu.updated_at = now_ms();
            tx.put_menu(&menu)?;
            Ok(menu)
        })?;
        info!(menu_id, "menu edited");
        Ok(menu)
    }

    /// Soft-delete a menu. Fails while live child menus or endpoints still reference it.
    pub fn delete_menu(&self, menu_id: &str) -> Result<()> {
        self.transact(|tx| {
            let (d, ro) = (tx.dbs(), tx.ro());
            let mut menu = read::get_menu(d, ro, menu_id)?;
            if read::list_menus(d, ro)?.iter().any(|m| declared_parent(m.parent_id.as_deref()) == Some(menu_id)) {
                return Err(PathbitError::IntegrityViolation(format!("menu {} still has child menus", menu_id)));
            }
            if read::list_paths(d, ro)?.iter().any(|p| p.menu_id == menu_id) {
                return Err(PathbitError::IntegrityViolation(format!("menu {} still has endpoints", menu_id)));
            }
            let now = now_ms();
            menu.deleted_at = Some(now);
            menu.updated_at = now;
            tx.put_menu(&menu)
        })?;
        info!(menu_id, "menu deleted");
        Ok(())
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    pub fn add_path(&self, input: NewPath) -> Result<Path> {
        let method = validate::method(&input.method)?;
        let pattern = validate::pattern(&input.path)?;
        let description = validate::text("description", &input.description)?;
        let path = self.transact(|tx| {
            read::get_menu(tx.dbs(), tx.ro(), &input.menu_id)?;
            let now = now_ms();
            let path = Path {
                id: Uuid::new_v4().to_string(),
                menu_id: input.menu_id.clone(),
                method,
                path: pattern,
                description,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            tx.claim_route(&path.method, &path.path, &path.id)?;
            tx.put_path(&path)?;
            Ok(path)
        })?;
        info!(path_id = %path.id, method = %path.method, path = %path.path, "endpoint added");
        Ok(path)
    }

    /// Grants reference endpoints by id, so moving or re-routing one leaves every
    /// materialization valid.
    pub fn edit_path(&self, path_id: &str, update: PathUpdate) -> Result<Path> {
        let method = update.method.as_deref().map(validate::method).transpose()?;
        let pattern = update.path.as_deref().map(validate::pattern).transpose()?;
        let description = update.description.as_deref().map(|s| validate::text("description", s)).transpose()?;
        let path = self.transact(|tx| {
            let mut path = read::get_path(tx.dbs(), tx.ro(), path_id)?;
            if let Some(menu_id) = &update.menu_id {
                read::get_menu(tx.dbs(), tx.ro(), menu_id)?;
                path.menu_id = menu_id.clone();
            }
            let method = method.unwrap_or_else(|| path.method.clone());
            let pattern = pattern.unwrap_or_else(|| path.path.clone());
            if method != path.method || pattern != path.path {
                tx.release_route(&path.method, &path.path, &path.id)?;
                tx.claim_route(&method, &pattern, &path.id)?;
                path.method = method;
                path.path = pattern;
            }
            if let Some(d) = description {
                path.description = d;
            }
            path.updated_at = now_ms();
            tx.put_path(&path)?;
            Ok(path)
        })?;
        info!(path_id, "endpoint edited");
        Ok(path)
    }

    /// Soft-delete an endpoint and revoke it from every role. Returns the affected users.
    pub fn delete_path(&self, path_id: &str) -> Result<Vec<String>> {
        let affected = self.transact(|tx| {
            let mut path = read::get_path(tx.dbs(), tx.ro(), path_id)?;
            tx.release_route(&path.method, &path.path, &path.id)?;
            let now = now_ms();
            path.deleted_at = Some(now);
            path.updated_at = now;
            tx.put_path(&path)?;
            propagate::on_path_deleted(tx, path_id)
        })?;
        info!(path_id, affected = affected.len(), "endpoint deleted");
        Ok(affected)
    }
}
