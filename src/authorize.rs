//! Authorization check over materialized effective permissions

use std::collections::BTreeSet;

use tracing::debug;

use crate::db::Store;
use crate::error::Result;
use crate::propagate;
use crate::read;

impl Store {
    /// Whether `user_id` may call `method path`. The route must match a registered endpoint
    /// exactly; unknown routes are denied. Unknown users fail with `NotFound`.
    pub fn is_authorized(&self, user_id: &str, method: &str, path: &str) -> Result<bool> {
        let (route, cached) = self.read(|d, tx| {
            read::get_user(d, tx, user_id)?;
            Ok((read::lookup_route(d, tx, method, path)?, read::cached_permissions(d, tx, user_id)?))
        })?;
        let Some(path_id) = route else {
            debug!(user_id, method, path, "unknown route denied");
            return Ok(false);
        };
        let perms = match cached {
            Some(p) => p,
            None => self.transact(|tx| propagate::materialize(tx, user_id))?,
        };
        let allowed = perms.path_ids.contains(&path_id);
        debug!(user_id, method, path, allowed, "authorization checked");
        Ok(allowed)
    }

    /// The endpoint ids `user_id` may call, rebuilding the materialization when invalidated
    pub fn effective_permissions(&self, user_id: &str) -> Result<BTreeSet<String>> {
        let cached = self.read(|d, tx| {
            read::get_user(d, tx, user_id)?;
            read::cached_permissions(d, tx, user_id)
        })?;
        match cached {
            Some(p) => Ok(p.path_ids),
            None => Ok(self.transact(|tx| propagate::materialize(tx, user_id))?.path_ids),
        }
    }
}
