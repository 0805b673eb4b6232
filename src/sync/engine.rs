//! Transfer executor.
//!
//! Every command runs the same front half: fetch one remote snapshot, read
//! the meta blob, observe each enabled item and reconcile. `status` stops
//! there. `push` uploads accepted items in one partial update together with
//! a bumped meta blob. `pull` prepares and writes items one at a time,
//! confirming through a [`Prompter`], then records the new state.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::canonical::{local_canonical, read_local};
use super::confirm::{ConfirmChoice, ConfirmationPolicy, Prompter};
use super::detect::{ItemSnapshot, Observation, detect};
use super::document;
use super::file::atomic_write;
use super::hash::fingerprint;
use super::hooks::{self, HooksStrategy};
use super::merge::{MergePolicy, MergeSchema, merge_documents};
use super::meta::{META_KEY, RemoteMeta};
use super::reconcile::{Reconciliation, reconcile};
use super::types::{ItemError, ItemReport, ItemResult, ItemStatus, Outcome, RunReport};
use crate::archive;
use crate::config::{ItemDescriptor, ItemKind, ItemRole, SyncState};
use crate::error::{Error, Result};
use crate::remote::{RemoteSnapshot, RemoteStore};

/// Options for [`Engine::push`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PushOptions {
    pub dry_run: bool,
    /// Upload conflicting items anyway.
    pub force: bool,
}

/// Options for [`Engine::pull`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PullOptions {
    pub dry_run: bool,
    /// Overwrite conflicting items anyway.
    pub force: bool,
    pub policy: MergePolicy,
    /// Hooks handling for settings items. `None` asks the prompter when
    /// incoming hooks carry device-specific content, and merges when only
    /// the local hooks do.
    pub hooks: Option<HooksStrategy>,
    pub confirmation: ConfirmationPolicy,
}

/// Front half of every run.
struct Analysis<'a> {
    snapshot: RemoteSnapshot,
    meta: RemoteMeta,
    items: Vec<ItemSnapshot<'a>>,
    reconciliation: Reconciliation,
}

/// What pull did with one file or directory.
enum Applied {
    /// New content written.
    Written,
    /// Prepared content equals the local file.
    Identical,
    /// Merge policy kept the local copy.
    KeptLocal,
    /// Operator answered no.
    Declined,
    /// Operator quit the run.
    Quit,
}

/// Sync engine bound to one item list, one remote and one state file.
pub struct Engine<'a> {
    items: &'a [ItemDescriptor],
    remote: &'a dyn RemoteStore,
    state_path: PathBuf,
    state: SyncState,
}

impl<'a> Engine<'a> {
    /// Create an engine, loading the persisted state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file exists but cannot be parsed.
    pub fn new(
        items: &'a [ItemDescriptor],
        remote: &'a dyn RemoteStore,
        state_path: PathBuf,
    ) -> Result<Self> {
        let state = SyncState::load(&state_path)?;
        Ok(Self {
            items,
            remote,
            state_path,
            state,
        })
    }

    #[must_use]
    pub const fn state(&self) -> &SyncState {
        &self.state
    }

    fn analyze(&self) -> Result<Analysis<'a>> {
        let snapshot = self.remote.fetch()?;
        let meta = RemoteMeta::from_snapshot(&snapshot)?;

        if let (Some(recorded), Some(found)) = (&self.state.remote_identity, &meta.identity) {
            if recorded != found {
                return Err(Error::ForeignRemote {
                    recorded: recorded.clone(),
                    found: found.clone(),
                });
            }
        }

        let items = detect(self.items, &snapshot, &self.state);
        let flags: Vec<_> = items
            .iter()
            .map(|s| s.observed.as_ref().ok().map(Observation::flags))
            .collect();
        let reconciliation = reconcile(self.state.version, meta.version, &flags);

        let verdict = reconciliation.verdict;
        info!(
            direction = %verdict.direction,
            local_version = verdict.local_version,
            remote_version = verdict.effective_remote_version,
            "Reconciled"
        );

        Ok(Analysis {
            snapshot,
            meta,
            items,
            reconciliation,
        })
    }

    fn report(&self, analysis_meta: &RemoteMeta, reconciliation: &Reconciliation) -> RunReport {
        RunReport {
            direction: reconciliation.verdict.direction,
            local_version: self.state.version,
            remote_version: analysis_meta.version,
            version_after: self.state.version,
            dry_run: false,
            items: Vec::new(),
        }
    }

    /// Classify every item without transferring anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote cannot be read or belongs to another
    /// sync group.
    pub fn status(&self) -> Result<RunReport> {
        let analysis = self.analyze()?;
        let mut report = self.report(&analysis.meta, &analysis.reconciliation);

        for (snap, status) in analysis
            .items
            .into_iter()
            .zip(analysis.reconciliation.statuses)
        {
            report.items.push(match snap.observed {
                Ok(obs) => item_line(snap.item, status, Outcome::Unchanged, &obs),
                Err(e) => failed_line(snap.item, e),
            });
        }
        Ok(report)
    }

    /// Upload locally changed items.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote cannot be read or written, or the
    /// state cannot be saved. Item-level refusals are reported, not raised.
    pub fn push(&mut self, opts: PushOptions) -> Result<RunReport> {
        let analysis = self.analyze()?;
        let mut report = self.report(&analysis.meta, &analysis.reconciliation);
        report.dry_run = opts.dry_run;

        let mut uploads = BTreeMap::new();
        let mut settled = Vec::new();

        for (snap, status) in analysis
            .items
            .into_iter()
            .zip(analysis.reconciliation.statuses)
        {
            let item = snap.item;
            let obs = match snap.observed {
                Ok(obs) => obs,
                Err(e) => {
                    report.items.push(failed_line(item, e));
                    continue;
                }
            };

            let line = match status {
                ItemStatus::Synced => {
                    if !obs.local_hash.is_empty() {
                        settled.push((item.name.clone(), obs.local_hash.clone()));
                    }
                    item_line(item, status, Outcome::Unchanged, &obs)
                }
                ItemStatus::RemoteAhead => {
                    refused_line(item, status, &obs, ItemError::RemoteAhead)
                }
                ItemStatus::Conflict if !opts.force => {
                    refused_line(item, status, &obs, ItemError::Conflict)
                }
                ItemStatus::LocalAhead | ItemStatus::New | ItemStatus::Conflict => {
                    if obs.local_canonical.is_empty() {
                        debug!(item = %item.name, "Nothing to upload");
                        item_line(item, status, Outcome::Skipped, &obs)
                    } else if opts.dry_run {
                        item_line(item, status, Outcome::Planned, &obs)
                    } else {
                        uploads.insert(item.remote_key.clone(), obs.local_canonical.clone());
                        settled.push((item.name.clone(), obs.local_hash.clone()));
                        let mut line = item_line(item, ItemStatus::Synced, Outcome::Pushed, &obs);
                        line.remote_hash.clone_from(&obs.local_hash);
                        line
                    }
                }
                ItemStatus::Error => item_line(item, status, Outcome::Failed, &obs),
            };
            report.items.push(line);
        }

        if opts.dry_run {
            return Ok(report);
        }

        let now = Utc::now();
        let meta = &analysis.meta;
        if uploads.is_empty() {
            if meta.needs_identity() {
                let next = meta.next(meta.version.max(self.state.version), now);
                self.write_meta(&next)?;
                self.state.remote_identity.clone_from(&next.identity);
            } else {
                self.adopt_identity(meta);
            }
        } else {
            let version = meta.version.max(self.state.version) + 1;
            let next = meta.next(version, now);
            let count = uploads.len();
            uploads.insert(META_KEY.to_string(), next.to_blob()?);
            self.remote.update(&uploads)?;
            info!(items = count, version, "Pushed to remote");

            self.state.raise_version(version);
            self.state.remote_identity.clone_from(&next.identity);
            self.state.last_sync = Some(now);
        }

        for (name, hash) in settled {
            self.state.record(&name, &hash, &hash, now);
        }
        self.state.save(&self.state_path)?;
        report.version_after = self.state.version;
        Ok(report)
    }

    /// Apply remote changes locally.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the operator quits (state for items
    /// already applied is saved first), or an error if the remote cannot be
    /// read or the state cannot be saved.
    pub fn pull(&mut self, opts: &PullOptions, prompter: &mut dyn Prompter) -> Result<RunReport> {
        let analysis = self.analyze()?;
        let mut report = self.report(&analysis.meta, &analysis.reconciliation);
        report.dry_run = opts.dry_run;

        let verdict = analysis.reconciliation.verdict;
        let now = Utc::now();
        let mut confirmation = opts.confirmation;
        let mut applied_any = false;

        for (snap, status) in analysis
            .items
            .into_iter()
            .zip(analysis.reconciliation.statuses)
        {
            let item = snap.item;
            let obs = match snap.observed {
                Ok(obs) => obs,
                Err(e) => {
                    report.items.push(failed_line(item, e));
                    continue;
                }
            };

            match status {
                ItemStatus::RemoteAhead => {}
                ItemStatus::Conflict if opts.force => {}
                ItemStatus::Conflict => {
                    report
                        .items
                        .push(refused_line(item, status, &obs, ItemError::Conflict));
                    continue;
                }
                ItemStatus::Synced => {
                    if !opts.dry_run && !obs.remote_hash.is_empty() {
                        self.state
                            .record(&item.name, &obs.local_hash, &obs.remote_hash, now);
                    }
                    report.items.push(item_line(item, status, Outcome::Unchanged, &obs));
                    continue;
                }
                ItemStatus::LocalAhead | ItemStatus::New | ItemStatus::Error => {
                    report.items.push(item_line(item, status, Outcome::Unchanged, &obs));
                    continue;
                }
            }

            let remote_raw = match analysis.snapshot.get(&item.remote_key) {
                Some(raw) if item.kind == ItemKind::Directory || !raw.trim().is_empty() => raw,
                _ => {
                    debug!(item = %item.name, "Nothing to download");
                    report.items.push(item_line(item, status, Outcome::Skipped, &obs));
                    continue;
                }
            };
            if opts.dry_run {
                report.items.push(item_line(item, status, Outcome::Planned, &obs));
                continue;
            }

            let applied = apply_item(item, remote_raw, &obs, opts, &mut confirmation, prompter);
            let line = match applied {
                Err(e) => failed_line(item, e),
                Ok(Applied::Quit) => {
                    info!(item = %item.name, "Pull cancelled");
                    self.state.save(&self.state_path)?;
                    return Err(Error::Cancelled);
                }
                Ok(Applied::Declined) => {
                    self.record_kept(item, &obs, now);
                    item_line(item, ItemStatus::LocalAhead, Outcome::KeptLocal, &obs)
                }
                Ok(applied) => {
                    let kept = matches!(applied, Applied::KeptLocal);
                    applied_any |= matches!(applied, Applied::Written);
                    self.settle_pulled(item, status, &obs, kept, now)
                }
            };
            report.items.push(line);
        }

        if opts.dry_run {
            return Ok(report);
        }

        self.state.raise_version(verdict.effective_remote_version);
        self.state.last_sync = Some(now);

        let meta = &analysis.meta;
        if applied_any && (verdict.effective_remote_version > meta.version || meta.needs_identity()) {
            let next = meta.next(verdict.effective_remote_version.max(meta.version), now);
            self.write_meta(&next)?;
            self.state.remote_identity.clone_from(&next.identity);
        } else {
            self.adopt_identity(meta);
        }

        self.state.save(&self.state_path)?;
        report.version_after = self.state.version;
        Ok(report)
    }

    /// Recompute the local fingerprint after applying and record the item.
    fn settle_pulled(
        &mut self,
        item: &ItemDescriptor,
        status: ItemStatus,
        obs: &Observation,
        kept: bool,
        now: DateTime<Utc>,
    ) -> ItemReport {
        let local_hash = match local_canonical(item) {
            Ok(content) => fingerprint(&content),
            Err(e) => return failed_line(item, e),
        };

        let mut line = item_line(item, status, Outcome::Pulled, obs);
        line.local_hash.clone_from(&local_hash);

        if local_hash == obs.remote_hash {
            self.state.record(&item.name, &local_hash, &obs.remote_hash, now);
            line.status = ItemStatus::Synced;
        } else {
            // Local keeps content the remote lacks; record the remote as
            // seen so the difference shows up as local_ahead next time.
            self.record_kept(item, obs, now);
            line.status = ItemStatus::LocalAhead;
            if kept {
                line.outcome = Outcome::KeptLocal;
            }
        }
        line
    }

    fn record_kept(&mut self, item: &ItemDescriptor, obs: &Observation, now: DateTime<Utc>) {
        self.state
            .record(&item.name, &obs.remote_hash, &obs.remote_hash, now);
    }

    fn adopt_identity(&mut self, meta: &RemoteMeta) {
        if meta.identity.is_some() {
            self.state.remote_identity.clone_from(&meta.identity);
        }
    }

    fn write_meta(&self, meta: &RemoteMeta) -> Result<()> {
        let blobs = BTreeMap::from([(META_KEY.to_string(), meta.to_blob()?)]);
        self.remote.update(&blobs)?;
        debug!(version = meta.version, "Wrote remote meta");
        Ok(())
    }
}

fn item_line(item: &ItemDescriptor, status: ItemStatus, outcome: Outcome, obs: &Observation) -> ItemReport {
    ItemReport {
        name: item.name.clone(),
        status,
        outcome,
        local_hash: obs.local_hash.clone(),
        remote_hash: obs.remote_hash.clone(),
        error: None,
    }
}

fn refused_line(item: &ItemDescriptor, status: ItemStatus, obs: &Observation, error: ItemError) -> ItemReport {
    ItemReport {
        error: Some(error),
        ..item_line(item, status, Outcome::Refused, obs)
    }
}

fn failed_line(item: &ItemDescriptor, error: ItemError) -> ItemReport {
    warn!(item = %item.name, error = %error, "Item failed");
    ItemReport {
        name: item.name.clone(),
        status: ItemStatus::Error,
        outcome: Outcome::Failed,
        local_hash: String::new(),
        remote_hash: String::new(),
        error: Some(error),
    }
}

/// Content prepared for a file item.
enum Prepared {
    Content(String),
    /// Merge policy keeps the local copy.
    KeepLocal,
    /// Operator cancelled the pull while preparing.
    Cancelled,
}

/// Prepare, confirm and write one item.
fn apply_item(
    item: &ItemDescriptor,
    remote_raw: &str,
    obs: &Observation,
    opts: &PullOptions,
    confirmation: &mut ConfirmationPolicy,
    prompter: &mut dyn Prompter,
) -> ItemResult<Applied> {
    let path = item.path();

    if item.kind == ItemKind::Directory {
        if !obs.local_canonical.is_empty() {
            if opts.policy == MergePolicy::PreferLocal {
                return Ok(Applied::KeptLocal);
            }
            if obs.local_canonical == remote_raw.trim() {
                return Ok(Applied::Identical);
            }
            let current = archive::manifest(&obs.local_canonical)?;
            if !current.is_empty() && !confirmation.is_auto() {
                let incoming = archive::manifest(remote_raw)?;
                if let Some(answer) =
                    confirm_replace(&item.name, &current, &incoming, confirmation, prompter)
                {
                    return Ok(answer);
                }
            }
        }
        archive::unpack(remote_raw, &path)?;
        debug!(item = %item.name, path = %path.display(), "Unpacked directory");
        return Ok(Applied::Written);
    }

    let current = read_local(item)?;
    let prepared = match prepare_file(item, &current, remote_raw, opts, confirmation, prompter)? {
        Prepared::Content(content) => content,
        Prepared::KeepLocal => return Ok(Applied::KeptLocal),
        Prepared::Cancelled => return Ok(Applied::Quit),
    };
    if prepared == current {
        return Ok(Applied::Identical);
    }

    if !current.trim().is_empty() && !confirmation.is_auto() {
        if let Some(answer) = confirm_replace(&item.name, &current, &prepared, confirmation, prompter)
        {
            return Ok(answer);
        }
    }

    atomic_write(&path, &prepared).map_err(|source| ItemError::Write {
        path: path.clone(),
        source,
    })?;
    debug!(item = %item.name, path = %path.display(), "Wrote file");
    Ok(Applied::Written)
}

/// Ask before replacing existing local content.
///
/// Returns `None` to go ahead, or the outcome for a declined or quit item.
fn confirm_replace(
    name: &str,
    current: &str,
    incoming: &str,
    confirmation: &mut ConfirmationPolicy,
    prompter: &mut dyn Prompter,
) -> Option<Applied> {
    loop {
        match prompter.confirm(name, current, incoming) {
            ConfirmChoice::Yes => return None,
            ConfirmChoice::YesToAll => {
                *confirmation = confirmation.escalated();
                return None;
            }
            ConfirmChoice::No => return Some(Applied::Declined),
            ConfirmChoice::Quit => return Some(Applied::Quit),
            ConfirmChoice::Preview => prompter.preview(name, incoming),
        }
    }
}

/// Content to write for a file item.
fn prepare_file(
    item: &ItemDescriptor,
    current: &str,
    remote_raw: &str,
    opts: &PullOptions,
    confirmation: &mut ConfirmationPolicy,
    prompter: &mut dyn Prompter,
) -> ItemResult<Prepared> {
    if !item.is_structured() {
        if opts.policy == MergePolicy::PreferLocal && !current.trim().is_empty() {
            return Ok(Prepared::KeepLocal);
        }
        return Ok(Prepared::Content(remote_raw.to_string()));
    }

    let role = item.role();
    let remote = if role == ItemRole::Settings {
        match hooks_strategy(item, current, remote_raw, opts, *confirmation, prompter) {
            None => return Ok(Prepared::Cancelled),
            Some(HooksStrategy::Overwrite) => remote_raw.to_string(),
            Some(HooksStrategy::Keep) => hooks::overlay_keep_local_hooks(current, remote_raw)?,
            Some(HooksStrategy::Merge) => hooks::overlay_merge_hooks(current, remote_raw)?,
        }
    } else {
        remote_raw.to_string()
    };

    let mut remote_doc = document::parse_lenient(&remote, "remote");
    if let Some(filter) = &item.filter {
        remote_doc = filter.apply(remote_doc);
    }
    if current.trim().is_empty() {
        return Ok(Prepared::Content(document::to_pretty(&remote_doc)));
    }

    let merged = merge_documents(
        document::parse_lenient(current, "local"),
        remote_doc,
        opts.policy,
        MergeSchema::for_role(role),
        prompter,
        *confirmation,
    );
    *confirmation = merged.confirmation;
    debug!(
        item = %item.name,
        added = merged.stats.added,
        replaced = merged.stats.replaced,
        kept_local = merged.stats.kept_local,
        "Merged document"
    );
    Ok(Prepared::Content(document::to_pretty(&merged.document)))
}

/// Hooks handling for one settings item, or `None` if the operator
/// cancelled.
///
/// Without an explicit strategy, device-specific incoming hooks are put to
/// the prompter on interactive runs. Otherwise local device-specific hooks
/// select a merge so they survive, and everything else is overwritten.
fn hooks_strategy(
    item: &ItemDescriptor,
    current: &str,
    remote_raw: &str,
    opts: &PullOptions,
    confirmation: ConfirmationPolicy,
    prompter: &mut dyn Prompter,
) -> Option<HooksStrategy> {
    if let Some(strategy) = opts.hooks {
        return Some(strategy);
    }
    let incoming = hooks::analyze(&document::parse_lenient(remote_raw, "remote"));
    if incoming.has_device_content() && !confirmation.is_auto() {
        return prompter.choose_hooks(&item.name, &incoming);
    }
    let local = hooks::analyze(&document::parse_lenient(current, "local"));
    if local.has_device_content() {
        debug!(item = %item.name, hooks = ?local.hook_types, "Keeping machine-specific local hooks");
        return Some(HooksStrategy::Merge);
    }
    Some(HooksStrategy::Overwrite)
}
