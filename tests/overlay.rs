//! Permission overlay tests
//!
//! Upward propagation of grants through the menu tree, on hand-built forests and through
//! the role views of a real store.

use std::collections::BTreeSet;

use pathbit::overlay::find_menu;
use pathbit::{build_tree, overlay, Menu, NewMenu, NewPath, NewRole, Path, Store};
use proptest::prelude::*;
use tempfile::TempDir;

fn setup() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();
    (dir, store)
}

// ============================================================================
// Store-backed views
// ============================================================================

/// Dashboard (m1, GET /dashboard) contains Reports (m2, GET /reports); the role holds only e2
#[test]
fn dashboard_reports_scenario() {
    let (_dir, store) = setup();
    let m1 = store.add_menu(NewMenu { parent_id: None, name: "Dashboard".into() }).unwrap();
    let m2 = store.add_menu(NewMenu { parent_id: Some(m1.id.clone()), name: "Reports".into() }).unwrap();
    let e1 = store
        .add_path(NewPath { menu_id: m1.id.clone(), method: "GET".into(), path: "/dashboard".into(), ..Default::default() })
        .unwrap();
    let e2 = store
        .add_path(NewPath { menu_id: m2.id.clone(), method: "GET".into(), path: "/reports".into(), ..Default::default() })
        .unwrap();
    let role = store
        .add_role(NewRole { name: "reporter".into(), path_ids: vec![e2.id.clone()], ..Default::default() })
        .unwrap();

    let tree = store.get_role_permission_tree(&role.id).unwrap();
    let dash = find_menu(&tree, &m1.id).unwrap();
    let reports = find_menu(&tree, &m2.id).unwrap();

    assert!(dash.is_permitted);
    assert!(reports.is_permitted);
    assert_eq!(dash.paths[0].id, e1.id);
    assert!(!dash.paths[0].is_granted);
    assert_eq!(reports.paths[0].id, e2.id);
    assert!(reports.paths[0].is_granted);
}

#[test]
fn role_without_grants_permits_nothing() {
    let (_dir, store) = setup();
    let m = store.add_menu(NewMenu { parent_id: None, name: "Dashboard".into() }).unwrap();
    store
        .add_path(NewPath { menu_id: m.id.clone(), method: "GET".into(), path: "/dashboard".into(), ..Default::default() })
        .unwrap();
    let role = store.add_role(NewRole { name: "nobody".into(), ..Default::default() }).unwrap();

    let info = store.role_info(&role.id).unwrap();
    assert_eq!(info.role.id, role.id);
    assert_eq!(info.menu_data.len(), 1);
    assert!(!info.menu_data[0].is_permitted);
    assert!(info.menu_data[0].paths.iter().all(|p| !p.is_granted));
}

// ============================================================================
// Properties
// ============================================================================

/// Random forest: menu i hangs under some j < i or is a root; endpoint k belongs to some menu
fn forest_strategy() -> impl Strategy<Value = (Vec<Menu>, Vec<Path>, Vec<bool>, Vec<bool>)> {
    (1usize..24)
        .prop_flat_map(|n| {
            let parents = proptest::collection::vec(proptest::option::of(0usize..n), n);
            let owners = proptest::collection::vec(0usize..n, 0..40);
            (Just(n), parents, owners)
        })
        .prop_flat_map(|(n, parents, owners)| {
            let k = owners.len();
            (
                Just(n),
                Just(parents),
                Just(owners),
                proptest::collection::vec(any::<bool>(), k),
                proptest::collection::vec(any::<bool>(), k),
            )
        })
        .prop_map(|(n, parents, owners, g1, extra)| {
            let menus = (0..n)
                .map(|i| Menu {
                    id: format!("m{}", i),
                    // only point at earlier menus so the hierarchy stays acyclic
                    parent_id: parents[i].filter(|&p| p < i).map(|p| format!("m{}", p)),
                    name: format!("menu {}", i),
                    created_at: i as u64,
                    updated_at: i as u64,
                    deleted_at: None,
                })
                .collect();
            let paths = owners
                .iter()
                .enumerate()
                .map(|(k, &m)| Path {
                    id: format!("p{}", k),
                    menu_id: format!("m{}", m),
                    method: "GET".into(),
                    path: format!("/p{}", k),
                    description: String::new(),
                    created_at: k as u64,
                    updated_at: k as u64,
                    deleted_at: None,
                })
                .collect();
            // g2 = g1 ∪ extra, so g1 ⊆ g2
            let g2 = g1.iter().zip(&extra).map(|(a, b)| *a || *b).collect();
            (menus, paths, g1, g2)
        })
}

fn grant_set(flags: &[bool]) -> BTreeSet<String> {
    flags.iter().enumerate().filter(|(_, g)| **g).map(|(k, _)| format!("p{}", k)).collect()
}

proptest! {
    #[test]
    fn growing_grants_never_unpermits_a_menu((menus, paths, g1, g2) in forest_strategy()) {
        let forest = build_tree(&menus, &paths).unwrap();
        let small = overlay(&forest.roots, &grant_set(&g1));
        let large = overlay(&forest.roots, &grant_set(&g2));
        for m in &menus {
            let a = find_menu(&small, &m.id).unwrap();
            let b = find_menu(&large, &m.id).unwrap();
            prop_assert!(!a.is_permitted || b.is_permitted, "menu {} lost permission", m.id);
        }
    }

    #[test]
    fn granted_endpoint_permits_every_ancestor((menus, paths, g1, _g2) in forest_strategy()) {
        let forest = build_tree(&menus, &paths).unwrap();
        let out = overlay(&forest.roots, &grant_set(&g1));
        for (k, granted) in g1.iter().enumerate() {
            if !*granted {
                continue;
            }
            let mut cur = Some(paths[k].menu_id.clone());
            while let Some(id) = cur {
                let node = find_menu(&out, &id).unwrap();
                prop_assert!(node.is_permitted, "ancestor {} of p{} not permitted", id, k);
                cur = node.parent_id.clone();
            }
        }
    }

    #[test]
    fn permitted_menu_has_a_granted_descendant((menus, paths, g1, _g2) in forest_strategy()) {
        let forest = build_tree(&menus, &paths).unwrap();
        let out = overlay(&forest.roots, &grant_set(&g1));
        let mut stack: Vec<_> = out.iter().collect();
        while let Some(n) = stack.pop() {
            let mut any = false;
            let mut inner: Vec<_> = vec![n];
            while let Some(m) = inner.pop() {
                any |= m.paths.iter().any(|p| p.is_granted);
                inner.extend(m.children.iter());
            }
            prop_assert_eq!(n.is_permitted, any);
            stack.extend(n.children.iter());
        }
    }
}
