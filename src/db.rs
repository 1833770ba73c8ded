//! LMDB environment, database handles and transaction scoping

use byteorder::BigEndian;
use heed::types::{Bytes, SerdeJson, Str, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use tracing::debug;

use crate::config::StoreConfig;
use crate::constants::MAX_DBS;
use crate::error::{err, Result};
use crate::keys::{build_prefix, get_part, pair_key};
use crate::model::{Admin, EffectivePermissions, Menu, Path, Role, User};
use crate::tx::Tx;

// Database type aliases
pub type Records<T> = Database<Str, SerdeJson<T>>;
pub type AssocDb = Database<Bytes, U64<BigEndian>>;
pub type IndexDb = Database<Bytes, Str>;

/// Milliseconds since the unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Association set stored twice: fwd[owner,member] and rev[member,owner] stay in sync.
/// Values are the epoch at which the row was created.
pub struct Assoc {
    pub fwd: AssocDb,
    pub rev: AssocDb,
}

impl Assoc {
    pub fn put(&self, tx: &mut RwTxn, owner: &str, member: &str, epoch: u64) -> Result<()> {
        self.fwd.put(tx, &pair_key(owner, member)?, &epoch).map_err(err)?;
        self.rev.put(tx, &pair_key(member, owner)?, &epoch).map_err(err)
    }

    pub fn del(&self, tx: &mut RwTxn, owner: &str, member: &str) -> Result<bool> {
        let r = self.fwd.delete(tx, &pair_key(owner, member)?).map_err(err)?;
        self.rev.delete(tx, &pair_key(member, owner)?).map_err(err)?;
        Ok(r)
    }

    /// Members of `owner` with their row epochs
    pub fn list_fwd(&self, tx: &RoTxn, owner: &str) -> Result<Vec<(String, u64)>> {
        Self::list_pfx(tx, &self.fwd, owner)
    }

    /// Owners holding `member` with their row epochs
    pub fn list_rev(&self, tx: &RoTxn, member: &str) -> Result<Vec<(String, u64)>> {
        Self::list_pfx(tx, &self.rev, member)
    }

    fn list_pfx(tx: &RoTxn, db: &AssocDb, first: &str) -> Result<Vec<(String, u64)>> {
        let prefix = build_prefix(&[first])?;
        let mut r = Vec::new();
        for item in db.prefix_iter(tx, &prefix).map_err(err)? {
            let (k, v) = item.map_err(err)?;
            if let Some(second) = get_part(k, 1) {
                r.push((second.to_string(), v));
            }
        }
        Ok(r)
    }
}

/// All database handles
pub struct Dbs {
    pub menus: Records<Menu>,
    pub paths: Records<Path>,
    pub roles: Records<Role>,
    pub users: Records<User>,
    pub admins: Records<Admin>,
    /// [METHOD][pattern] -> path id
    pub routes: IndexDb,
    /// role name -> role id
    pub role_names: IndexDb,
    /// [field][value] -> user id
    pub user_keys: IndexDb,
    /// [field][value] -> admin id
    pub admin_keys: IndexDb,
    /// role <-> path grants
    pub role_paths: Assoc,
    /// user <-> role assignments
    pub user_roles: Assoc,
    /// user id -> materialized effective permissions
    pub perms: Records<EffectivePermissions>,
}

/// Handle to an opened pathbit store. Cheap to share behind an `Arc`.
pub struct Store {
    env: Env,
    dbs: Dbs,
}

impl Store {
    /// Open (or create) a store at `path` with default limits
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::open_with(&StoreConfig::at(path.as_ref()))
    }

    pub fn open_with(config: &StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.path).map_err(err)?;
        // SAFETY: LMDB requires that the same path is not opened twice in one process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.map_size)
                .max_readers(config.max_readers)
                .max_dbs(MAX_DBS)
                .open(&config.path)
                .map_err(err)?
        };
        let mut tx = env.write_txn().map_err(err)?;
        let dbs = Dbs {
            menus: env.create_database(&mut tx, Some("menus")).map_err(err)?,
            paths: env.create_database(&mut tx, Some("paths")).map_err(err)?,
            roles: env.create_database(&mut tx, Some("roles")).map_err(err)?,
            users: env.create_database(&mut tx, Some("users")).map_err(err)?,
            admins: env.create_database(&mut tx, Some("admins")).map_err(err)?,
            routes: env.create_database(&mut tx, Some("routes")).map_err(err)?,
            role_names: env.create_database(&mut tx, Some("role_names")).map_err(err)?,
            user_keys: env.create_database(&mut tx, Some("user_keys")).map_err(err)?,
            admin_keys: env.create_database(&mut tx, Some("admin_keys")).map_err(err)?,
            role_paths: Assoc {
                fwd: env.create_database(&mut tx, Some("role_paths")).map_err(err)?,
                rev: env.create_database(&mut tx, Some("path_roles")).map_err(err)?,
            },
            user_roles: Assoc {
                fwd: env.create_database(&mut tx, Some("user_roles")).map_err(err)?,
                rev: env.create_database(&mut tx, Some("role_users")).map_err(err)?,
            },
            perms: env.create_database(&mut tx, Some("perms")).map_err(err)?,
        };
        tx.commit().map_err(err)?;
        debug!(path = %config.path.display(), "store opened");
        Ok(Store { env, dbs })
    }

    #[inline]
    pub fn dbs(&self) -> &Dbs {
        &self.dbs
    }

    /// Execute a read-only operation against one consistent snapshot
    pub fn read<T, F: FnOnce(&Dbs, &RoTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let tx = self.env.read_txn().map_err(err)?;
        f(&self.dbs, &tx)
    }

    /// Run `f` in one write transaction. Any error aborts every write made by `f`.
    pub fn transact<T, F: FnOnce(&mut Tx) -> Result<T>>(&self, f: F) -> Result<T> {
        let mut tx = Tx::new(self.env.write_txn().map_err(err)?, &self.dbs);
        match f(&mut tx) {
            Ok(r) => {
                tx.commit()?;
                Ok(r)
            }
            Err(e) => {
                debug!(error = %e, "transaction aborted");
                Err(e)
            }
        }
    }

    /// Clear all databases (for testing)
    pub fn clear_all(&self) -> Result<()> {
        self.transact(|tx| tx.clear())
    }
}
