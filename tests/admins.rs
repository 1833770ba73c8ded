//! Admin accounts and password authentication tests

use pathbit::{AdminFilter, AdminUpdate, NewAdmin, PageRequest, PathbitError, Store};
use tempfile::TempDir;

fn setup() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();
    (dir, store)
}

fn admin(username: &str, password: &str) -> NewAdmin {
    NewAdmin { username: username.into(), password: password.into(), ..Default::default() }
}

#[test]
fn login_with_correct_password() {
    let (_dir, store) = setup();
    let created = store.add_admin(admin("root", "hunter22")).unwrap();
    assert!(created.password_hash.is_empty());

    let logged_in = store.login_admin("root", "hunter22").unwrap();
    assert_eq!(logged_in.id, created.id);
    assert!(logged_in.last_login_at.is_some());
    assert!(logged_in.password_hash.is_empty());
}

#[test]
fn login_rejects_wrong_password_and_unknown_user() {
    let (_dir, store) = setup();
    store.add_admin(admin("root", "hunter22")).unwrap();
    assert_eq!(store.login_admin("root", "hunter23"), Err(PathbitError::InvalidCredentials));
    assert_eq!(store.login_admin("nobody", "hunter22"), Err(PathbitError::InvalidCredentials));
    assert!(store.admin_info(&store.list_admins(&AdminFilter::default(), PageRequest::default()).unwrap().items[0].id)
        .unwrap()
        .last_login_at
        .is_none());
}

#[test]
fn password_bounds() {
    let (_dir, store) = setup();
    assert!(matches!(store.add_admin(admin("root", "short")), Err(PathbitError::Invalid(_))));
    assert!(matches!(store.add_admin(admin("root", &"p".repeat(33))), Err(PathbitError::Invalid(_))));
}

#[test]
fn change_password() {
    let (_dir, store) = setup();
    let a = store.add_admin(admin("root", "hunter22")).unwrap();

    assert_eq!(
        store.change_admin_password(&a.id, "wrong-old", "newpass1"),
        Err(PathbitError::InvalidCredentials)
    );
    assert!(matches!(store.change_admin_password(&a.id, "hunter22", "hunter22"), Err(PathbitError::Invalid(_))));

    store.change_admin_password(&a.id, "hunter22", "newpass1").unwrap();
    assert_eq!(store.login_admin("root", "hunter22"), Err(PathbitError::InvalidCredentials));
    store.login_admin("root", "newpass1").unwrap();
}

#[test]
fn duplicate_username_conflicts() {
    let (_dir, store) = setup();
    store.add_admin(admin("root", "hunter22")).unwrap();
    assert!(matches!(store.add_admin(admin("root", "other-pass")), Err(PathbitError::Conflict(_))));
}

#[test]
fn rename_then_login_with_new_name() {
    let (_dir, store) = setup();
    let a = store.add_admin(admin("root", "hunter22")).unwrap();
    let edited = store
        .edit_admin(&a.id, AdminUpdate { username: Some("operator".into()), nickname: Some("Ops".into()), ..Default::default() })
        .unwrap();
    assert_eq!(edited.nickname, "Ops");
    assert_eq!(store.login_admin("root", "hunter22"), Err(PathbitError::InvalidCredentials));
    store.login_admin("operator", "hunter22").unwrap();
}

#[test]
fn deleted_admin_cannot_login() {
    let (_dir, store) = setup();
    let a = store.add_admin(admin("root", "hunter22")).unwrap();
    store.delete_admin(&a.id).unwrap();
    assert_eq!(store.login_admin("root", "hunter22"), Err(PathbitError::InvalidCredentials));
    assert_eq!(store.list_admins(&AdminFilter::default(), PageRequest::default()).unwrap().total, 0);
    // username can be reused
    store.add_admin(admin("root", "another1")).unwrap();
}

#[test]
fn list_never_exposes_digests() {
    let (_dir, store) = setup();
    store.add_admin(admin("root", "hunter22")).unwrap();
    store.add_admin(admin("operator", "hunter22")).unwrap();
    let page = store.list_admins(&AdminFilter::default(), PageRequest::default()).unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items.iter().all(|a| a.password_hash.is_empty()));
    let json = serde_json::to_string(&page.items).unwrap();
    assert!(!json.contains("password_hash"));
}

#[test]
fn list_filters_by_id_and_contact_prefix() {
    let (_dir, store) = setup();
    let root = store
        .add_admin(NewAdmin { email: "root@example.com".into(), phone: "+14155550100".into(), ..admin("root", "hunter22") })
        .unwrap();
    store.add_admin(NewAdmin { email: "ops@example.org".into(), ..admin("rootless", "hunter22") }).unwrap();
    store.add_admin(admin("operator", "hunter22")).unwrap();

    let names = |filter: AdminFilter| {
        let mut v: Vec<String> =
            store.list_admins(&filter, PageRequest::default()).unwrap().items.into_iter().map(|a| a.username).collect();
        v.sort();
        v
    };
    assert_eq!(names(AdminFilter { username: Some("root".into()), ..Default::default() }), vec!["root", "rootless"]);
    assert_eq!(names(AdminFilter { email: Some("ops@".into()), ..Default::default() }), vec!["rootless"]);
    assert_eq!(names(AdminFilter { phone: Some("+1415".into()), ..Default::default() }), vec!["root"]);
    // id is matched exactly, not as a prefix
    assert_eq!(names(AdminFilter { id: Some(root.id.clone()), ..Default::default() }), vec!["root"]);
    assert!(names(AdminFilter { id: Some(root.id[..8].to_string()), ..Default::default() }).is_empty());
    // empty values do not filter
    assert_eq!(names(AdminFilter { username: Some(String::new()), ..Default::default() }).len(), 3);
}
