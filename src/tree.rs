//! Menu tree builder: flat parent-pointer menus plus endpoints into a rooted forest.
//!
//! Construction is map-then-link over an index arena: every menu gets a slot, endpoints are
//! bucketed by owning slot, parents are resolved to slots, and nodes are assembled leaves-first
//! so no recursion is needed however deep the hierarchy is.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::constants::NULL_PARENT;
use crate::error::{PathbitError, Result};
use crate::model::{Menu, Path};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathInfo {
    pub id: String,
    pub method: String,
    pub path: String,
    pub description: String,
}

impl From<&Path> for PathInfo {
    fn from(p: &Path) -> Self {
        PathInfo {
            id: p.id.clone(),
            method: p.method.clone(),
            path: p.path.clone(),
            description: p.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub paths: Vec<PathInfo>,
    pub children: Vec<MenuNode>,
}

/// A reference the builder had to recover from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dangling {
    /// Endpoint dropped: its owning menu is not in the snapshot
    Path { path_id: String, menu_id: String },
    /// Menu promoted to root: its parent is not in the snapshot
    Menu { menu_id: String, parent_id: String },
}

impl std::fmt::Display for Dangling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dangling::Path { path_id, menu_id } => write!(f, "path {} references missing menu {}", path_id, menu_id),
            Dangling::Menu { menu_id, parent_id } => {
                write!(f, "menu {} references missing parent {}", menu_id, parent_id)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Forest {
    pub roots: Vec<MenuNode>,
    pub dangling: Vec<Dangling>,
}

impl Forest {
    /// Fail with the first recovered dangling reference, if any
    pub fn ensure_consistent(&self) -> Result<()> {
        match self.dangling.first() {
            Some(d) => Err(PathbitError::DanglingReference(d.to_string())),
            None => Ok(()),
        }
    }
}

/// Parent reference that means "root": absent, empty, or the literal `"null"`
#[inline]
pub(crate) fn declared_parent(parent_id: Option<&str>) -> Option<&str> {
    parent_id.filter(|p| !p.is_empty() && *p != NULL_PARENT)
}

/// Build the menu forest from one consistent snapshot of live menus and endpoints.
///
/// Roots and children keep input order. Orphan menus become roots and endpoints of missing
/// menus are dropped; both are reported in `Forest::dangling`. A parent chain that never
/// reaches a root fails with `IntegrityViolation`.
pub fn build_tree(menus: &[Menu], paths: &[Path]) -> Result<Forest> {
    let n = menus.len();
    let slot: HashMap<&str, usize> = menus.iter().enumerate().map(|(i, m)| (m.id.as_str(), i)).collect();
    let mut dangling = Vec::new();

    let mut owned: Vec<Vec<PathInfo>> = vec![Vec::new(); n];
    for p in paths {
        match slot.get(p.menu_id.as_str()) {
            Some(&i) => owned[i].push(PathInfo::from(p)),
            None => {
                warn!(path_id = %p.id, menu_id = %p.menu_id, "endpoint references missing menu");
                dangling.push(Dangling::Path { path_id: p.id.clone(), menu_id: p.menu_id.clone() });
            }
        }
    }

    let mut parent: Vec<Option<usize>> = vec![None; n];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots = Vec::new();
    for (i, m) in menus.iter().enumerate() {
        match declared_parent(m.parent_id.as_deref()) {
            None => roots.push(i),
            Some(pid) => match slot.get(pid) {
                Some(&p) => {
                    parent[i] = Some(p);
                    children[p].push(i);
                }
                None => {
                    warn!(menu_id = %m.id, parent_id = %pid, "menu references missing parent, treated as root");
                    dangling.push(Dangling::Menu { menu_id: m.id.clone(), parent_id: pid.to_string() });
                    roots.push(i);
                }
            },
        }
    }

    // Breadth-first from the roots: parents always precede their children in `order`
    let mut order = Vec::with_capacity(n);
    let mut reached = vec![false; n];
    for &r in &roots {
        reached[r] = true;
        order.push(r);
    }
    let mut head = 0;
    while head < order.len() {
        let i = order[head];
        head += 1;
        for &c in &children[i] {
            if !reached[c] {
                reached[c] = true;
                order.push(c);
            }
        }
    }

    if let Some(start) = reached.iter().position(|r| !r) {
        return Err(PathbitError::IntegrityViolation(format!(
            "menu hierarchy contains a cycle through menu {}",
            menus[on_cycle(&parent, start)].id
        )));
    }

    let mut built: Vec<Option<MenuNode>> = vec![None; n];
    for &i in order.iter().rev() {
        let m = &menus[i];
        let kids = children[i].iter().filter_map(|&c| built[c].take()).collect();
        built[i] = Some(MenuNode {
            id: m.id.clone(),
            parent_id: parent[i].map(|p| menus[p].id.clone()),
            name: m.name.clone(),
            paths: std::mem::take(&mut owned[i]),
            children: kids,
        });
    }

    Ok(Forest {
        roots: roots.iter().filter_map(|&r| built[r].take()).collect(),
        dangling,
    })
}

/// Walk parents from an unreachable menu until a slot repeats; that slot lies on the cycle
fn on_cycle(parent: &[Option<usize>], start: usize) -> usize {
    let mut seen = vec![false; parent.len()];
    let mut cur = start;
    while !seen[cur] {
        seen[cur] = true;
        match parent[cur] {
            Some(p) => cur = p,
            None => break,
        }
    }
    cur
}
