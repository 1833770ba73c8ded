//! Pathbit - menu-tree RBAC over LMDB
//!
//! Roles are granted individual HTTP endpoints ("paths"); endpoints hang off a hierarchical menu
//! tree; users hold roles. The engine builds the menu forest, overlays a grant set on it (a menu is
//! permitted when anything beneath it is granted), and keeps each user's materialized effective
//! permissions correct by invalidating them inside the same transaction that changes a grant.
//!
//! ```no_run
//! use pathbit::{NewMenu, NewPath, NewRole, NewUser, Store};
//!
//! let store = Store::open("data/pathbit")?;
//! let menu = store.add_menu(NewMenu { parent_id: None, name: "Reports".into() })?;
//! let list = store.add_path(NewPath { menu_id: menu.id, method: "GET".into(), path: "/reports".into(), ..Default::default() })?;
//! let role = store.add_role(NewRole { name: "auditor".into(), path_ids: vec![list.id], ..Default::default() })?;
//! let user = store.add_user(NewUser { username: "alice".into(), role_ids: vec![role.id], ..Default::default() })?;
//! assert!(store.is_authorized(&user.id, "GET", "/reports")?);
//! # Ok::<(), pathbit::PathbitError>(())
//! ```

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod keys;
pub mod model;
pub mod overlay;
pub mod propagate;
pub mod read;
pub mod tree;
pub mod tx;
pub mod validate;

mod admins;
mod authorize;
mod menus;
mod roles;
mod users;

pub use config::{LogConfig, LogFormat, ServerConfig, Settings, StoreConfig};
pub use db::Store;
pub use error::{PathbitError, Result};
pub use model::{
    Admin, AdminFilter, AdminUpdate, EffectivePermissions, Menu, MenuUpdate, NewAdmin, NewMenu, NewPath, NewRole,
    NewUser, PageRequest, Paged, Path, PathUpdate, Role, RoleFilter, RoleInfo, RoleRef, RoleUpdate, Status, User,
    UserFilter, UserInfo, UserUpdate,
};
pub use overlay::{overlay, RoleMenuNode, RolePathInfo};
pub use tree::{build_tree, Dangling, Forest, MenuNode, PathInfo};
pub use tx::Tx;
