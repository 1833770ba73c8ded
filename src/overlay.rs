//! Permission overlay: annotate a menu forest with one grant set

use std::collections::BTreeSet;

use serde::Serialize;

use crate::tree::MenuNode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolePathInfo {
    pub id: String,
    pub method: String,
    pub path: String,
    pub description: String,
    pub is_granted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleMenuNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    /// True when any endpoint in this subtree is granted
    pub is_permitted: bool,
    pub paths: Vec<RolePathInfo>,
    pub children: Vec<RoleMenuNode>,
}

impl RoleMenuNode {
    /// Depth-first search for a menu by id
    pub fn find(&self, id: &str) -> Option<&RoleMenuNode> {
        let mut stack = vec![self];
        while let Some(n) = stack.pop() {
            if n.id == id {
                return Some(n);
            }
            stack.extend(n.children.iter());
        }
        None
    }

    /// Copy keeping only permitted menus and granted endpoints
    pub fn pruned(&self) -> Option<RoleMenuNode> {
        if !self.is_permitted {
            return None;
        }
        Some(RoleMenuNode {
            id: self.id.clone(),
            parent_id: self.parent_id.clone(),
            name: self.name.clone(),
            is_permitted: true,
            paths: self.paths.iter().filter(|p| p.is_granted).cloned().collect(),
            children: self.children.iter().filter_map(RoleMenuNode::pruned).collect(),
        })
    }
}

/// Annotate every endpoint with `is_granted` and every menu with `is_permitted`.
/// A menu is permitted when one of its own endpoints is granted or any child menu is permitted,
/// so a grant deep in the tree marks every ancestor.
pub fn overlay(roots: &[MenuNode], granted: &BTreeSet<String>) -> Vec<RoleMenuNode> {
    roots.iter().map(|r| annotate(r, granted)).collect()
}

/// Post-order: children are annotated before the parent flag is derived from them
fn annotate(node: &MenuNode, granted: &BTreeSet<String>) -> RoleMenuNode {
    let children: Vec<RoleMenuNode> = node.children.iter().map(|c| annotate(c, granted)).collect();
    let paths: Vec<RolePathInfo> = node
        .paths
        .iter()
        .map(|p| RolePathInfo {
            id: p.id.clone(),
            method: p.method.clone(),
            path: p.path.clone(),
            description: p.description.clone(),
            is_granted: granted.contains(&p.id),
        })
        .collect();
    let is_permitted = paths.iter().any(|p| p.is_granted) || children.iter().any(|c| c.is_permitted);
    RoleMenuNode {
        id: node.id.clone(),
        parent_id: node.parent_id.clone(),
        name: node.name.clone(),
        is_permitted,
        paths,
        children,
    }
}

/// Find a menu anywhere in an annotated forest
pub fn find_menu<'a>(roots: &'a [RoleMenuNode], id: &str) -> Option<&'a RoleMenuNode> {
    roots.iter().find_map(|r| r.find(id))
}
