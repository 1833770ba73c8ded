//! Stored records, request inputs and paging types

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE, MAX_PAGE_SIZE};

/// Enabled/disabled flag shared by roles and users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Enabled,
    Disabled,
}

impl Status {
    #[inline]
    pub fn is_enabled(self) -> bool {
        self == Status::Enabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub id: String,
    /// `None` for roots
    pub parent_id: Option<String>,
    pub name: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub deleted_at: Option<u64>,
}

/// A routable endpoint owned by exactly one menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub id: String,
    pub menu_id: String,
    pub method: String,
    pub path: String,
    pub description: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub deleted_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: Status,
    pub remark: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub deleted_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub phone: String,
    pub status: Status,
    pub remark: String,
    pub last_login_at: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
    pub deleted_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    pub id: String,
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub phone: String,
    pub remark: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub password_hash: String,
    pub last_login_at: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
    pub deleted_at: Option<u64>,
}

impl Admin {
    /// Copy safe to hand out of the crate
    pub fn redacted(mut self) -> Self {
        self.password_hash.clear();
        self
    }
}

/// Common accessors over soft-deletable stored records
pub trait Record {
    fn id(&self) -> &str;
    fn created_at(&self) -> u64;
    fn deleted_at(&self) -> Option<u64>;

    #[inline]
    fn is_live(&self) -> bool {
        self.deleted_at().is_none()
    }
}

macro_rules! impl_record {
    ($($t:ty),*) => {$(
        impl Record for $t {
            #[inline]
            fn id(&self) -> &str {
                &self.id
            }
            #[inline]
            fn created_at(&self) -> u64 {
                self.created_at
            }
            #[inline]
            fn deleted_at(&self) -> Option<u64> {
                self.deleted_at
            }
        }
    )*};
}

impl_record!(Menu, Path, Role, User, Admin);

/// Materialized union of endpoint ids across a user's enabled roles.
/// An absent record means the user has been invalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermissions {
    pub user_id: String,
    pub path_ids: BTreeSet<String>,
    pub computed_at: u64,
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMenu {
    pub parent_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MenuUpdate {
    pub name: Option<String>,
    /// `Some(None)` moves the menu to the root. A JSON `null` deserializes to `Some(None)`,
    /// an absent field to `None`.
    #[serde(default, deserialize_with = "present_or_null")]
    pub parent_id: Option<Option<String>>,
}

fn present_or_null<'de, D>(de: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPath {
    pub menu_id: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathUpdate {
    pub menu_id: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub path_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub remark: Option<String>,
    /// `None` keeps the current grants, `Some(vec![])` revokes all of them
    pub path_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub role_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<Status>,
    pub remark: Option<String>,
    pub role_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAdmin {
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub remark: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminUpdate {
    pub username: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub remark: Option<String>,
}

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<RoleRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleInfo {
    #[serde(flatten)]
    pub role: Role,
    pub menu_data: Vec<crate::overlay::RoleMenuNode>,
}

/// 1-based page request; newest records first
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest { page: default_page(), page_size: default_page_size() }
    }
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        PageRequest { page, page_size }
    }

    /// Slice one page out of `items`, clamping page to 1..=MAX_PAGE and size to 1..=MAX_PAGE_SIZE
    pub fn apply<T>(&self, items: Vec<T>) -> Paged<T> {
        let size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        let page = self.page.clamp(1, MAX_PAGE);
        let total = items.len();
        let items = items.into_iter().skip((page - 1).saturating_mul(size)).take(size).collect();
        Paged { total, items }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paged<T> {
    pub total: usize,
    pub items: Vec<T>,
}

// ============================================================================
// List filters
// ============================================================================

// Unset or empty filters match everything
fn starts_with(want: &Option<String>, value: &str) -> bool {
    match want.as_deref() {
        Some(w) if !w.is_empty() => value.starts_with(w),
        _ => true,
    }
}

/// Role listing filter: `id` and `name` match as prefixes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleFilter {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl RoleFilter {
    pub fn matches(&self, role: &Role) -> bool {
        starts_with(&self.id, &role.id) && starts_with(&self.name, &role.name)
    }
}

/// User listing filter: text fields match as prefixes, `status` exactly
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserFilter {
    pub id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<Status>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        starts_with(&self.id, &user.id)
            && starts_with(&self.username, &user.username)
            && starts_with(&self.email, &user.email)
            && starts_with(&self.phone, &user.phone)
            && self.status.map_or(true, |s| s == user.status)
    }
}

/// Admin listing filter: `id` matches exactly, the contact fields as prefixes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminFilter {
    pub id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl AdminFilter {
    pub fn matches(&self, admin: &Admin) -> bool {
        let id_ok = match self.id.as_deref() {
            Some(id) if !id.is_empty() => id == admin.id,
            _ => true,
        };
        id_ok
            && starts_with(&self.username, &admin.username)
            && starts_with(&self.email, &admin.email)
            && starts_with(&self.phone, &admin.phone)
    }
}
