//! Console administrators and password credentials.
//!
//! Passwords are stored as `hex(salt)$hex(sha256(salt || password))` with a random 16-byte salt.

use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::constants::SALT_LEN;
use crate::db::{now_ms, Store};
use crate::error::{PathbitError, Result};
use crate::model::{Admin, AdminFilter, AdminUpdate, NewAdmin, PageRequest, Paged};
use crate::read;
use crate::validate;

mod hex {
    pub fn encode(data: impl AsRef<[u8]>) -> String {
        data.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

fn generate_salt() -> Result<String> {
    let mut bytes = [0u8; SALT_LEN];
    getrandom::getrandom(&mut bytes).map_err(|e| PathbitError::Transaction(e.to_string()))?;
    Ok(hex::encode(bytes))
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = generate_salt()?;
    let hash = digest(&salt, password);
    Ok(format!("{}${}", salt, hash))
}

/// Compare without short-circuiting on the first differing byte
pub(crate) fn verify_password(stored: &str, password: &str) -> bool {
    let Some((salt, hash)) = stored.split_once('$') else {
        return false;
    };
    let computed = digest(salt, password);
    computed.len() == hash.len() && computed.bytes().zip(hash.bytes()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

impl Store {
    pub fn add_admin(&self, input: NewAdmin) -> Result<Admin> {
        validate::password(&input.password)?;
        let now = now_ms();
        let admin = Admin {
            id: Uuid::new_v4().to_string(),
            username: validate::name("username", &input.username)?,
            nickname: validate::text("nickname", &input.nickname)?,
            email: validate::email(&input.email)?,
            phone: validate::phone(&input.phone)?,
            remark: validate::text("remark", &input.remark)?,
            password_hash: hash_password(&input.password)?,
            last_login_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.transact(|tx| {
            tx.claim_admin_keys(&admin)?;
            tx.put_admin(&admin)
        })?;
        info!(admin_id = %admin.id, username = %admin.username, "admin added");
        Ok(admin.redacted())
    }

    pub fn edit_admin(&self, admin_id: &str, update: AdminUpdate) -> Result<Admin> {
        let username = update.username.as_deref().map(|v| validate::name("username", v)).transpose()?;
        let nickname = update.nickname.as_deref().map(|v| validate::text("nickname", v)).transpose()?;
        let email = update.email.as_deref().map(validate::email).transpose()?;
        let phone = update.phone.as_deref().map(validate::phone).transpose()?;
        let remark = update.remark.as_deref().map(|v| validate::text("remark", v)).transpose()?;

        let admin = self.transact(|tx| {
            let old = read::get_admin(tx.dbs(), tx.ro(), admin_id)?;
            let mut admin = old.clone();
            if let Some(v) = username {
                admin.username = v;
            }
            if let Some(v) = nickname {
                admin.nickname = v;
            }
            if let Some(v) = email {
                admin.email = v;
            }
            if let Some(v) = phone {
                admin.phone = v;
            }
            if let Some(v) = remark {
                admin.remark = v;
            }
            admin.updated_at = now_ms();
            tx.release_admin_keys(&old)?;
            tx.claim_admin_keys(&admin)?;
            tx.put_admin(&admin)?;
            Ok(admin)
        })?;
        info!(admin_id, "admin edited");
        Ok(admin.redacted())
    }

    pub fn delete_admin(&self, admin_id: &str) -> Result<()> {
        self.transact(|tx| {
            let mut admin = read::get_admin(tx.dbs(), tx.ro(), admin_id)?;
            tx.release_admin_keys(&admin)?;
            let now = now_ms();
            admin.deleted_at = Some(now);
            admin.updated_at = now;
            tx.put_admin(&admin)
        })?;
        info!(admin_id, "admin deleted");
        Ok(())
    }

    pub fn admin_info(&self, admin_id: &str) -> Result<Admin> {
        Ok(self.read(|d, tx| read::get_admin(d, tx, admin_id))?.redacted())
    }

    /// Live admins matching `filter`, newest first, without password digests
    pub fn list_admins(&self, filter: &AdminFilter, page: PageRequest) -> Result<Paged<Admin>> {
        let admins = self.read(|d, tx| read::list_live(&d.admins, tx))?;
        let admins = admins.into_iter().rev().filter(|a| filter.matches(a)).map(Admin::redacted);
        Ok(page.apply(admins.collect()))
    }

    /// Verify credentials and stamp `last_login_at`. Unknown usernames and wrong passwords
    /// both fail with `InvalidCredentials`.
    pub fn login_admin(&self, username: &str, password: &str) -> Result<Admin> {
        let admin = self.transact(|tx| {
            let found = read::admin_by_username(tx.dbs(), tx.ro(), username.trim())?;
            let mut admin = match found {
                Some(a) if verify_password(&a.password_hash, password) => a,
                _ => return Err(PathbitError::InvalidCredentials),
            };
            admin.last_login_at = Some(now_ms());
            tx.put_admin(&admin)?;
            Ok(admin)
        });
        match admin {
            Ok(a) => {
                info!(admin_id = %a.id, "admin logged in");
                Ok(a.redacted())
            }
            Err(e) => {
                if e == PathbitError::InvalidCredentials {
                    warn!(username, "admin login rejected");
                }
                Err(e)
            }
        }
    }

    /// Replace a password after checking the current one. The new password must differ.
    pub fn change_admin_password(&self, admin_id: &str, old_password: &str, new_password: &str) -> Result<()> {
        validate::password(new_password)?;
        if old_password == new_password {
            return Err(PathbitError::Invalid("new password must differ from the old one".into()));
        }
        let hash = hash_password(new_password)?;
        self.transact(|tx| {
            let mut admin = read::get_admin(tx.dbs(), tx.ro(), admin_id)?;
            if !verify_password(&admin.password_hash, old_password) {
                return Err(PathbitError::InvalidCredentials);
            }
            admin.password_hash = hash;
            admin.updated_at = now_ms();
            tx.put_admin(&admin)
        })?;
        info!(admin_id, "admin password changed");
        Ok(())
    }
}
