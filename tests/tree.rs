//! Menu tree construction tests
//!
//! Covers completeness, ordering, orphan recovery and cycle detection over a real store.

use std::thread::sleep;
use std::time::Duration;

use pathbit::{Dangling, Menu, MenuNode, NewMenu, NewPath, PathbitError, Store};
use tempfile::TempDir;

fn setup() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();
    (dir, store)
}

fn menu(store: &Store, name: &str, parent: Option<&str>) -> String {
    let m = store.add_menu(NewMenu { parent_id: parent.map(Into::into), name: name.into() }).unwrap();
    // created_at has millisecond resolution; keep insertion order observable
    sleep(Duration::from_millis(2));
    m.id
}

fn endpoint(store: &Store, menu_id: &str, method: &str, path: &str) -> String {
    store
        .add_path(NewPath { menu_id: menu_id.into(), method: method.into(), path: path.into(), ..Default::default() })
        .unwrap()
        .id
}

fn count(nodes: &[MenuNode]) -> (usize, usize) {
    let mut menus = 0;
    let mut paths = 0;
    let mut stack: Vec<&MenuNode> = nodes.iter().collect();
    while let Some(n) = stack.pop() {
        menus += 1;
        paths += n.paths.len();
        stack.extend(n.children.iter());
    }
    (menus, paths)
}

/// Raw menu record written straight through a transaction, bypassing parent validation
fn raw_menu(store: &Store, id: &str, parent: Option<&str>, created_at: u64) {
    let m = Menu {
        id: id.into(),
        parent_id: parent.map(Into::into),
        name: id.into(),
        created_at,
        updated_at: created_at,
        deleted_at: None,
    };
    store.transact(|tx| tx.put_menu(&m)).unwrap();
}

// ============================================================================
// Completeness & Ordering
// ============================================================================

#[test]
fn empty_store_yields_empty_forest() {
    let (_dir, store) = setup();
    assert!(store.get_menu_tree().unwrap().is_empty());
}

#[test]
fn every_menu_and_endpoint_appears_once() {
    let (_dir, store) = setup();
    let system = menu(&store, "System", None);
    let users = menu(&store, "Users", Some(&system));
    let roles = menu(&store, "Roles", Some(&system));
    let audit = menu(&store, "Audit", Some(&roles));
    let home = menu(&store, "Home", None);

    endpoint(&store, &users, "GET", "/users");
    endpoint(&store, &users, "POST", "/users");
    endpoint(&store, &roles, "GET", "/roles");
    endpoint(&store, &audit, "GET", "/audit");
    endpoint(&store, &home, "GET", "/home");

    let tree = store.get_menu_tree().unwrap();
    assert_eq!(count(&tree), (5, 5));
    assert_eq!(tree.len(), 2);
    assert_eq!(tree[0].id, system);
    assert_eq!(tree[1].id, home);

    let sys = &tree[0];
    assert_eq!(sys.children.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec![users.as_str(), roles.as_str()]);
    assert_eq!(sys.children[0].paths.len(), 2);
    assert_eq!(sys.children[1].children[0].id, audit);
    assert_eq!(sys.children[1].children[0].parent_id.as_deref(), Some(roles.as_str()));
}

#[test]
fn null_parent_string_is_root() {
    let (_dir, store) = setup();
    let a = menu(&store, "Dashboard", Some("null"));
    let b = menu(&store, "Settings", Some(""));
    let tree = store.get_menu_tree().unwrap();
    assert_eq!(tree.iter().map(|n| n.id.clone()).collect::<Vec<_>>(), vec![a, b]);
    assert!(tree.iter().all(|n| n.parent_id.is_none()));
}

#[test]
fn deleted_records_are_excluded() {
    let (_dir, store) = setup();
    let m = menu(&store, "Reports", None);
    let gone = menu(&store, "Legacy", None);
    let p = endpoint(&store, &m, "GET", "/reports");
    endpoint(&store, &m, "GET", "/reports/export");
    store.delete_path(&p).unwrap();
    store.delete_menu(&gone).unwrap();

    let tree = store.get_menu_tree().unwrap();
    assert_eq!(count(&tree), (1, 1));
    assert_eq!(tree[0].paths[0].path, "/reports/export");
}

// ============================================================================
// Orphans & Cycles
// ============================================================================

#[test]
fn orphan_menu_becomes_root_with_diagnostic() {
    let (_dir, store) = setup();
    raw_menu(&store, "root", None, 1);
    raw_menu(&store, "orphan", Some("ghost"), 2);
    raw_menu(&store, "child", Some("orphan"), 3);

    let forest = store.get_menu_forest().unwrap();
    assert_eq!(forest.roots.len(), 2);
    assert_eq!(forest.roots[1].id, "orphan");
    assert_eq!(forest.roots[1].children[0].id, "child");
    assert_eq!(
        forest.dangling,
        vec![Dangling::Menu { menu_id: "orphan".into(), parent_id: "ghost".into() }]
    );
    assert!(matches!(forest.ensure_consistent(), Err(PathbitError::DanglingReference(_))));
}

#[test]
fn parent_cycle_is_integrity_violation() {
    let (_dir, store) = setup();
    raw_menu(&store, "root", None, 1);
    raw_menu(&store, "a", Some("b"), 2);
    raw_menu(&store, "b", Some("a"), 3);

    match store.get_menu_tree() {
        Err(PathbitError::IntegrityViolation(msg)) => assert!(msg.contains("cycle")),
        other => panic!("expected integrity violation, got {:?}", other),
    }
}

#[test]
fn consistent_store_has_no_diagnostics() {
    let (_dir, store) = setup();
    let m = menu(&store, "Reports", None);
    endpoint(&store, &m, "GET", "/reports");
    let forest = store.get_menu_forest().unwrap();
    assert!(forest.dangling.is_empty());
    forest.ensure_consistent().unwrap();
}
