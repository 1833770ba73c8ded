//! User CRUD and role assignment

use std::collections::BTreeSet;

use tracing::info;
use uuid::Uuid;

use crate::db::{now_ms, Store};
use crate::error::{PathbitError, Result};
use crate::model::{NewUser, PageRequest, Paged, RoleRef, User, UserFilter, UserInfo, UserUpdate};
use crate::propagate;
use crate::read;
use crate::validate;

impl Store {
    pub fn add_user(&self, input: NewUser) -> Result<User> {
        let now = now_ms();
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: validate::name("username", &input.username)?,
            nickname: validate::text("nickname", &input.nickname)?,
            email: validate::email(&input.email)?,
            phone: validate::phone(&input.phone)?,
            status: input.status,
            remark: validate::text("remark", &input.remark)?,
            last_login_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let role_ids: BTreeSet<String> = input.role_ids.into_iter().collect();
        self.transact(|tx| {
            tx.claim_user_keys(&user)?;
            tx.put_user(&user)?;
            propagate::on_user_roles_changed(tx, &user.id, &role_ids)
        })?;
        info!(user_id = %user.id, username = %user.username, roles = role_ids.len(), "user added");
        Ok(user)
    }

    pub fn edit_user(&self, user_id: &str, update: UserUpdate) -> Result<User> {
        let username = update.username.as_deref().map(|v| validate::name("username", v)).transpose()?;
        let nickname = update.nickname.as_deref().map(|v| validate::text("nickname", v)).transpose()?;
        let email = update.email.as_deref().map(validate::email).transpose()?;
        let phone = update.phone.as_deref().map(validate::phone).transpose()?;
        let remark = update.remark.as_deref().map(|v| validate::text("remark", v)).transpose()?;
        let role_ids: Option<BTreeSet<String>> = update.role_ids.map(|ids| ids.into_iter().collect());

        let user = self.transact(|tx| {
            let old = read::get_user(tx.dbs(), tx.ro(), user_id)?;
            let mut user = old.clone();
            if let Some(v) = username {
                user.username = v;
            }
            if let Some(v) = nickname {
                user.nickname = v;
            }
            if let Some(v) = email {
                user.email = v;
            }
            if let Some(v) = phone {
                user.phone = v;
            }
            if let Some(v) = remark {
                user.remark = v;
            }
            if let Some(s) = update.status {
                user.status = s;
            }
            user.updated_at = now_ms();

            tx.release_user_keys(&old)?;
            tx.claim_user_keys(&user)?;
            tx.put_user(&user)?;
            if user.status != old.status {
                propagate::on_user_status_changed(tx, &user.id)?;
            }
            if let Some(ids) = &role_ids {
                propagate::on_user_roles_changed(tx, &user.id, ids)?;
            }
            Ok(user)
        })?;
        info!(user_id, "user edited");
        Ok(user)
    }

    /// Soft-delete a user, releasing its unique keys and role assignments
    pub fn delete_user(&self, user_id: &str) -> Result<()> {
        self.transact(|tx| {
            let mut user = read::get_user(tx.dbs(), tx.ro(), user_id)?;
            tx.release_user_keys(&user)?;
            let now = now_ms();
            user.deleted_at = Some(now);
            user.updated_at = now;
            tx.put_user(&user)?;
            propagate::on_user_deleted(tx, user_id)
        })?;
        info!(user_id, "user deleted");
        Ok(())
    }

    /// User record with the live roles it holds
    pub fn user_info(&self, user_id: &str) -> Result<UserInfo> {
        self.read(|d, tx| {
            let user = read::get_user(d, tx, user_id)?;
            let mut roles = Vec::new();
            for role_id in read::roles_held_by_user(d, tx, user_id)? {
                match read::get_role(d, tx, &role_id) {
                    Ok(role) => roles.push(RoleRef { id: role.id, name: role.name }),
                    Err(PathbitError::NotFound { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(UserInfo { user, roles })
        })
    }

    /// Live users matching `filter`, newest first
    pub fn list_users(&self, filter: &UserFilter, page: PageRequest) -> Result<Paged<User>> {
        let mut users = self.read(|d, tx| read::list_live(&d.users, tx))?;
        users.retain(|u| filter.matches(u));
        users.reverse();
        Ok(page.apply(users))
    }
}
