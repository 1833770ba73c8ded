//! Menu and endpoint CRUD tests

use pathbit::{read, MenuUpdate, NewMenu, NewPath, NewRole, NewUser, PathUpdate, PathbitError, Store};
use tempfile::TempDir;

fn setup() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();
    (dir, store)
}

fn menu(store: &Store, name: &str, parent: Option<&str>) -> String {
    store.add_menu(NewMenu { parent_id: parent.map(Into::into), name: name.into() }).unwrap().id
}

fn endpoint(menu_id: &str, method: &str, path: &str) -> NewPath {
    NewPath { menu_id: menu_id.into(), method: method.into(), path: path.into(), ..Default::default() }
}

// ============================================================================
// Menus
// ============================================================================

#[test]
fn add_menu_requires_existing_parent() {
    let (_dir, store) = setup();
    let r = store.add_menu(NewMenu { parent_id: Some("missing".into()), name: "Reports".into() });
    assert!(matches!(r, Err(PathbitError::NotFound { kind: "menu", .. })));
}

#[test]
fn null_parent_is_stored_as_root() {
    let (_dir, store) = setup();
    let m = store.add_menu(NewMenu { parent_id: Some("null".into()), name: "Dashboard".into() }).unwrap();
    assert_eq!(m.parent_id, None);
}

#[test]
fn reparent_under_descendant_rejected() {
    let (_dir, store) = setup();
    let a = menu(&store, "System", None);
    let b = menu(&store, "Access", Some(&a));
    let c = menu(&store, "Roles", Some(&b));

    let under_child = MenuUpdate { parent_id: Some(Some(c.clone())), ..Default::default() };
    assert!(matches!(store.edit_menu(&a, under_child), Err(PathbitError::IntegrityViolation(_))));
    let under_self = MenuUpdate { parent_id: Some(Some(a.clone())), ..Default::default() };
    assert!(matches!(store.edit_menu(&a, under_self), Err(PathbitError::IntegrityViolation(_))));

    // tree unchanged
    let tree = store.get_menu_tree().unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].children[0].children[0].id, c);
}

#[test]
fn reparent_under_deep_chain() {
    let (_dir, store) = setup();
    let root = menu(&store, "Level 0", None);
    let mut deepest = root.clone();
    for i in 1..100 {
        deepest = menu(&store, &format!("Level {}", i), Some(&deepest));
    }
    let lone = menu(&store, "Detached", None);

    let under_deepest = MenuUpdate { parent_id: Some(Some(deepest.clone())), ..Default::default() };
    let moved = store.edit_menu(&lone, under_deepest).unwrap();
    assert_eq!(moved.parent_id.as_deref(), Some(deepest.as_str()));

    // the chain root now sits above the moved menu, however far down
    let under_lone = MenuUpdate { parent_id: Some(Some(lone.clone())), ..Default::default() };
    assert!(matches!(store.edit_menu(&root, under_lone), Err(PathbitError::IntegrityViolation(_))));
    assert_eq!(store.get_menu_tree().unwrap().len(), 1);
}

#[test]
fn reparent_and_move_to_root() {
    let (_dir, store) = setup();
    let a = menu(&store, "System", None);
    let b = menu(&store, "Access", None);

    let moved = store.edit_menu(&b, MenuUpdate { parent_id: Some(Some(a.clone())), ..Default::default() }).unwrap();
    assert_eq!(moved.parent_id.as_deref(), Some(a.as_str()));
    assert_eq!(store.get_menu_tree().unwrap().len(), 1);

    let back = store
        .edit_menu(&b, MenuUpdate { parent_id: Some(None), name: Some("Access control".into()) })
        .unwrap();
    assert_eq!(back.parent_id, None);
    assert_eq!(back.name, "Access control");
    assert_eq!(store.get_menu_tree().unwrap().len(), 2);
}

#[test]
fn delete_menu_forbidden_while_referenced() {
    let (_dir, store) = setup();
    let a = menu(&store, "System", None);
    let b = menu(&store, "Access", Some(&a));
    let p = store.add_path(endpoint(&b, "GET", "/access")).unwrap();

    assert!(matches!(store.delete_menu(&a), Err(PathbitError::IntegrityViolation(_))));
    assert!(matches!(store.delete_menu(&b), Err(PathbitError::IntegrityViolation(_))));

    let role = store.add_role(NewRole { name: "viewer".into(), path_ids: vec![p.id.clone()], ..Default::default() }).unwrap();
    let granting = store.read(|d, tx| read::role_ids_granting_path(d, tx, &p.id)).unwrap();
    assert_eq!(granting, vec![role.id.clone()]);

    store.delete_path(&p.id).unwrap();
    assert!(store.read(|d, tx| read::role_ids_granting_path(d, tx, &p.id)).unwrap().is_empty());
    assert!(store.role_info(&role.id).unwrap().menu_data[0].children[0].paths.is_empty());
    store.delete_menu(&b).unwrap();
    store.delete_menu(&a).unwrap();
    assert!(store.get_menu_tree().unwrap().is_empty());
}

#[test]
fn accessible_menus_keep_only_reachable_branches() {
    let (_dir, store) = setup();
    let system = menu(&store, "System", None);
    let access = menu(&store, "Access", Some(&system));
    let audit = menu(&store, "Audit", Some(&system));
    let reports = menu(&store, "Reports", None);
    let list_roles = store.add_path(endpoint(&access, "GET", "/roles")).unwrap();
    store.add_path(endpoint(&access, "POST", "/roles")).unwrap();
    store.add_path(endpoint(&audit, "GET", "/audit")).unwrap();
    store.add_path(endpoint(&reports, "GET", "/reports")).unwrap();

    let role = store
        .add_role(NewRole { name: "viewer".into(), path_ids: vec![list_roles.id.clone()], ..Default::default() })
        .unwrap();
    let user = store.add_user(NewUser { username: "alice".into(), role_ids: vec![role.id], ..Default::default() }).unwrap();

    let tree = store.get_user_accessible_menus(&user.id).unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].id, system);
    assert_eq!(tree[0].children.len(), 1);
    assert_eq!(tree[0].children[0].id, access);
    assert_eq!(tree[0].children[0].paths.len(), 1);
    assert_eq!(tree[0].children[0].paths[0].id, list_roles.id);

    // the full view still lists every menu
    assert_eq!(store.get_user_menu_tree(&user.id).unwrap().len(), 2);
}

// ============================================================================
// Endpoints
// ============================================================================

#[test]
fn endpoint_normalization_and_validation() {
    let (_dir, store) = setup();
    let m = menu(&store, "Reports", None);
    let p = store.add_path(endpoint(&m, "get", " /reports ")).unwrap();
    assert_eq!(p.method, "GET");
    assert_eq!(p.path, "/reports");

    assert!(matches!(store.add_path(endpoint(&m, "FETCH", "/x")), Err(PathbitError::Invalid(_))));
    assert!(matches!(store.add_path(endpoint(&m, "GET", "reports")), Err(PathbitError::Invalid(_))));
    assert!(matches!(store.add_path(endpoint("missing", "GET", "/x")), Err(PathbitError::NotFound { .. })));
}

#[test]
fn duplicate_route_conflicts() {
    let (_dir, store) = setup();
    let m = menu(&store, "Reports", None);
    store.add_path(endpoint(&m, "GET", "/reports")).unwrap();
    assert!(matches!(store.add_path(endpoint(&m, "GET", "/reports")), Err(PathbitError::Conflict(_))));
    // different method is a different route
    store.add_path(endpoint(&m, "POST", "/reports")).unwrap();
}

#[test]
fn reroute_keeps_grants() {
    let (_dir, store) = setup();
    let m = menu(&store, "Reports", None);
    let p = store.add_path(endpoint(&m, "GET", "/reports")).unwrap();
    let role = store.add_role(NewRole { name: "viewer".into(), path_ids: vec![p.id.clone()], ..Default::default() }).unwrap();
    let user = store.add_user(NewUser { username: "alice".into(), role_ids: vec![role.id], ..Default::default() }).unwrap();
    assert!(store.is_authorized(&user.id, "GET", "/reports").unwrap());

    store.edit_path(&p.id, PathUpdate { path: Some("/v2/reports".into()), ..Default::default() }).unwrap();
    assert!(!store.is_authorized(&user.id, "GET", "/reports").unwrap());
    assert!(store.is_authorized(&user.id, "GET", "/v2/reports").unwrap());

    // the old route is free again
    store.add_path(endpoint(&m, "GET", "/reports")).unwrap();
}

#[test]
fn move_endpoint_between_menus() {
    let (_dir, store) = setup();
    let a = menu(&store, "Reports", None);
    let b = menu(&store, "Exports", None);
    let p = store.add_path(endpoint(&a, "GET", "/export")).unwrap();
    let moved = store.edit_path(&p.id, PathUpdate { menu_id: Some(b.clone()), ..Default::default() }).unwrap();
    assert_eq!(moved.menu_id, b);

    let tree = store.get_menu_tree().unwrap();
    let node = |id: &str| tree.iter().find(|n| n.id == id).unwrap();
    assert!(node(&a).paths.is_empty());
    assert_eq!(node(&b).paths[0].id, p.id);

    let bad = PathUpdate { menu_id: Some("missing".into()), ..Default::default() };
    assert!(matches!(store.edit_path(&p.id, bad), Err(PathbitError::NotFound { .. })));
}

#[test]
fn delete_unknown_endpoint_is_not_found() {
    let (_dir, store) = setup();
    assert!(matches!(store.delete_path("missing"), Err(PathbitError::NotFound { kind: "path", .. })));
}
