// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Retry-on-conflict for writes driven from a freshly read object.

use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::ResourceStore;
use crate::types::resource::ManagedResource;

/// Attempts before a persistent conflict is handed back to the caller
pub const CONFLICT_RETRY_STEPS: u32 = 5;

const CONFLICT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Which write a retry loop issues
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteKind {
    Update,
    UpdateStatus,
    /// Finalize sub-resource when the store has one, plain update otherwise
    Finalize,
}

async fn write<K: ManagedResource>(store: &dyn ResourceStore<K>, kind: WriteKind, obj: &K) -> Result<K> {
    match kind {
        WriteKind::Update => store.update(obj).await,
        WriteKind::UpdateStatus => store.update_status(obj).await,
        WriteKind::Finalize => match store.finalize_api() {
            Some(api) => api.finalize(obj).await,
            None => store.update(obj).await,
        },
    }
}

/// Repeatedly derive the desired object from `current` and write it.
///
/// `produce` returns `None` when `current` already needs no write, in which
/// case `current` is returned as is. On a conflict the latest version is
/// fetched and `produce` runs again; if the refetched object carries a
/// different UID the loop aborts with [`Error::IdentityChanged`].
pub async fn retry_on_conflict<K, F>(
    store: &dyn ResourceStore<K>,
    current: K,
    kind: WriteKind,
    mut produce: F,
) -> Result<K>
where
    K: ManagedResource,
    F: FnMut(&K) -> Result<Option<K>>,
{
    let key = current.key();
    let expected_uid = current.uid_str().unwrap_or_default().to_string();
    let mut current = current;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let Some(desired) = produce(&current)? else {
            return Ok(current);
        };

        match write(store, kind, &desired).await {
            Ok(written) => return Ok(written),
            Err(e) if e.is_conflict() && attempt < CONFLICT_RETRY_STEPS => {
                debug!(kind = K::KIND, key = %key, attempt, "Write conflicted, refetching");
                tokio::time::sleep(CONFLICT_RETRY_DELAY).await;

                let latest = store.get(&key).await?;
                let actual_uid = latest.uid_str().unwrap_or_default();
                if actual_uid != expected_uid {
                    return Err(Error::IdentityChanged {
                        kind: K::KIND.to_string(),
                        key: key.to_string(),
                        expected: expected_uid,
                        actual: actual_uid.to_string(),
                    });
                }
                current = latest;
            }
            Err(e) => return Err(e),
        }
    }
}
