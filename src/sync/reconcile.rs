//! Version reconciliation.
//!
//! Per-item change flags are folded into one run-global [`Direction`] using
//! the local version counter and the remote meta version. The direction
//! only matters for items that changed on both sides; every other item is
//! classified from its own flags.

use serde::Serialize;

use super::types::{Direction, ItemStatus};

/// Change flags observed for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeFlags {
    pub local_changed: bool,
    pub remote_changed: bool,
    /// Local and remote canonical content hash the same.
    pub in_sync: bool,
}

/// Run-global version verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionVerdict {
    pub direction: Direction,
    pub local_dirty: bool,
    pub remote_dirty: bool,
    /// Local version counter plus one if anything changed locally.
    pub local_version: u64,
    /// Remote version, bumped past the local counter when the remote
    /// changed under a stale meta blob.
    pub effective_remote_version: u64,
}

/// Compute the run direction from the two counters and the dirty flags.
#[must_use]
pub fn reconcile_versions(
    state_version: u64,
    remote_version: u64,
    local_dirty: bool,
    remote_dirty: bool,
) -> VersionVerdict {
    let local_version = state_version + u64::from(local_dirty);

    let mut effective_remote_version = remote_version;
    if remote_dirty && effective_remote_version <= state_version {
        effective_remote_version = state_version + 1;
    }

    // A replica that never finished a run defers to an established remote.
    let first_sync = state_version == 0 && remote_version > 0;

    let direction = if !local_dirty && !remote_dirty {
        Direction::Synced
    } else if first_sync {
        Direction::Remote
    } else if local_version > effective_remote_version {
        Direction::Local
    } else if effective_remote_version > local_version {
        Direction::Remote
    } else if local_dirty && remote_dirty {
        Direction::Conflict
    } else if local_dirty {
        Direction::Local
    } else {
        Direction::Remote
    };

    VersionVerdict {
        direction,
        local_dirty,
        remote_dirty,
        local_version,
        effective_remote_version,
    }
}

/// Classify one item. Equal content is always `Synced`.
#[must_use]
pub fn item_status(flags: ChangeFlags, direction: Direction) -> ItemStatus {
    if flags.in_sync {
        return ItemStatus::Synced;
    }
    match (flags.local_changed, flags.remote_changed) {
        (true, false) => ItemStatus::LocalAhead,
        (false, true) => ItemStatus::RemoteAhead,
        (true, true) => match direction {
            Direction::Local => ItemStatus::LocalAhead,
            Direction::Remote => ItemStatus::RemoteAhead,
            Direction::Synced | Direction::Conflict => ItemStatus::Conflict,
        },
        (false, false) => ItemStatus::Conflict,
    }
}

/// Outcome of reconciling a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub verdict: VersionVerdict,
    /// One entry per input; `Error` for items that could not be observed.
    pub statuses: Vec<ItemStatus>,
}

/// Reconcile all items. `None` marks an item that failed observation; it
/// contributes to neither dirty flag.
#[must_use]
pub fn reconcile(state_version: u64, remote_version: u64, items: &[Option<ChangeFlags>]) -> Reconciliation {
    let observed = items.iter().flatten();
    let local_dirty = observed.clone().any(|f| f.local_changed);
    let remote_dirty = observed.clone().any(|f| f.remote_changed);
    let verdict = reconcile_versions(state_version, remote_version, local_dirty, remote_dirty);

    let statuses = items
        .iter()
        .map(|flags| match flags {
            Some(flags) => item_status(*flags, verdict.direction),
            None => ItemStatus::Error,
        })
        .collect();

    Reconciliation { verdict, statuses }
}
