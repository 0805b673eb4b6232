//! Change detection: fingerprint both sides of every item and compare with
//! the fingerprints recorded by the previous run.

use tracing::{debug, warn};

use super::canonical::{canonicalize, local_canonical};
use super::hash::{fingerprint, has_changed};
use super::reconcile::ChangeFlags;
use super::types::ItemResult;
use crate::config::{ItemDescriptor, SyncState};
use crate::remote::RemoteSnapshot;

/// What was seen for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Canonical local content; this exact text is what push uploads.
    pub local_canonical: String,
    pub local_hash: String,
    pub remote_hash: String,
    /// Blob exists on the remote.
    pub remote_present: bool,
    pub local_changed: bool,
    pub remote_changed: bool,
}

impl Observation {
    #[must_use]
    pub fn flags(&self) -> ChangeFlags {
        ChangeFlags {
            local_changed: self.local_changed,
            remote_changed: self.remote_changed,
            in_sync: self.local_hash == self.remote_hash,
        }
    }
}

/// One item with its observation or the error that prevented it.
#[derive(Debug)]
pub struct ItemSnapshot<'a> {
    pub item: &'a ItemDescriptor,
    pub observed: ItemResult<Observation>,
}

/// Observe a single item.
///
/// # Errors
///
/// Returns the item error if either side cannot be read or canonicalized.
pub fn observe(
    item: &ItemDescriptor,
    remote: &RemoteSnapshot,
    state: &SyncState,
) -> ItemResult<Observation> {
    let local_canonical = local_canonical(item)?;
    let remote_raw = remote.get(&item.remote_key);
    let remote_canonical = match remote_raw {
        Some(raw) => canonicalize(raw, item)?,
        None => String::new(),
    };

    let local_hash = fingerprint(&local_canonical);
    let remote_hash = fingerprint(&remote_canonical);
    let prior = state.item(&item.name);

    Ok(Observation {
        local_changed: has_changed(&local_hash, prior.map(|p| p.local_hash.as_str())),
        remote_changed: has_changed(&remote_hash, prior.map(|p| p.remote_hash.as_str())),
        local_canonical,
        local_hash,
        remote_hash,
        remote_present: remote_raw.is_some(),
    })
}

/// Observe every item, in order. Failures are kept per item.
pub fn detect<'a>(
    items: &'a [ItemDescriptor],
    remote: &RemoteSnapshot,
    state: &SyncState,
) -> Vec<ItemSnapshot<'a>> {
    items
        .iter()
        .map(|item| {
            let observed = observe(item, remote, state);
            match &observed {
                Ok(o) => debug!(
                    item = %item.name,
                    local_changed = o.local_changed,
                    remote_changed = o.remote_changed,
                    "Observed item"
                ),
                Err(e) => warn!(item = %item.name, error = %e, "Failed to observe item"),
            }
            ItemSnapshot { item, observed }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::types::ItemError;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn snapshot(pairs: &[(&str, &str)]) -> RemoteSnapshot {
        RemoteSnapshot::new(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn file_item(temp: &TempDir, name: &str) -> ItemDescriptor {
        let path = temp.path().join(format!("{name}.json"));
        ItemDescriptor::file(name, path.to_str().unwrap(), &format!("{name}.json"))
    }

    #[test]
    fn test_fresh_item_on_both_sides() {
        let temp = TempDir::new().unwrap();
        let item = file_item(&temp, "prefs");
        fs::write(item.path(), "local").unwrap();

        let obs = observe(&item, &snapshot(&[("prefs.json", "remote")]), &SyncState::default()).unwrap();
        assert!(obs.local_changed);
        assert!(obs.remote_changed);
        assert!(!obs.flags().in_sync);
        assert_eq!(obs.local_canonical, "local");
    }

    #[test]
    fn test_unchanged_since_last_run() {
        let temp = TempDir::new().unwrap();
        let item = file_item(&temp, "prefs");
        fs::write(item.path(), "same").unwrap();
        let hash = fingerprint("same");
        let mut state = SyncState::default();
        state.record("prefs", &hash, &hash, Utc::now());

        let obs = observe(&item, &snapshot(&[("prefs.json", "same")]), &state).unwrap();
        assert!(!obs.local_changed);
        assert!(!obs.remote_changed);
        assert!(obs.flags().in_sync);
    }

    #[test]
    fn test_missing_both_sides_is_in_sync() {
        let temp = TempDir::new().unwrap();
        let item = file_item(&temp, "absent");
        let obs = observe(&item, &snapshot(&[]), &SyncState::default()).unwrap();
        assert_eq!(obs.local_hash, "");
        assert_eq!(obs.remote_hash, "");
        assert!(!obs.remote_present);
        assert!(obs.flags().in_sync);
    }

    #[test]
    fn test_remote_deleted_is_remote_change() {
        let temp = TempDir::new().unwrap();
        let item = file_item(&temp, "prefs");
        fs::write(item.path(), "x").unwrap();
        let hash = fingerprint("x");
        let mut state = SyncState::default();
        state.record("prefs", &hash, &hash, Utc::now());

        let obs = observe(&item, &snapshot(&[]), &state).unwrap();
        assert!(!obs.local_changed);
        assert!(obs.remote_changed);
    }

    #[test]
    fn test_one_bad_item_does_not_stop_others() {
        let temp = TempDir::new().unwrap();
        let good = file_item(&temp, "good");
        fs::write(good.path(), "ok").unwrap();
        let bad = file_item(&temp, "settings")
            .with_filter(crate::sync::FieldFilter::Exclude(vec!["env".into()]));
        fs::write(bad.path(), "{not json").unwrap();

        let items = vec![bad, good];
        let snapshots = detect(&items, &snapshot(&[]), &SyncState::default());
        assert!(matches!(snapshots[0].observed, Err(ItemError::Parse(_))));
        assert!(snapshots[1].observed.is_ok());
    }
}
