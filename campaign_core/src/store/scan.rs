//! Vault scanning - builds a snapshot from `canon/` and `campaigns/<id>/`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use campaign_pages::{title_from_path, CampaignId, CanonPage, Overlay};

use super::{Snapshot, SnapshotBuilder, StoreError, StoreResult};
use crate::report::IssueKind;

/// Cooperative cancellation for long scans, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> StoreResult<()> {
        if self.is_cancelled() {
            Err(StoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Scan canon and campaign directories into a snapshot.
pub fn load(canon_root: impl AsRef<Path>, campaigns_root: impl AsRef<Path>) -> StoreResult<Snapshot> {
    load_with(canon_root, campaigns_root, &CancelFlag::new())
}

/// [`load`] with cooperative cancellation.
///
/// Documents with malformed frontmatter are skipped and recorded in the
/// snapshot report. Duplicate titles, I/O failures and cancellation abort
/// the whole scan.
pub fn load_with(
    canon_root: impl AsRef<Path>,
    campaigns_root: impl AsRef<Path>,
    cancel: &CancelFlag,
) -> StoreResult<Snapshot> {
    let canon_root = canon_root.as_ref();
    let campaigns_root = campaigns_root.as_ref();
    let started_at = Instant::now();

    if !canon_root.is_dir() {
        return Err(StoreError::RootNotFound(canon_root.to_path_buf()));
    }

    let mut builder = SnapshotBuilder::new();

    for path in markdown_files(canon_root, cancel)? {
        cancel.check()?;
        let Some(title) = title_from_path(&path) else {
            continue;
        };
        let Some(text) = read_document(&path, &mut builder)? else {
            continue;
        };
        match CanonPage::parse(title, &text) {
            Ok(page) => {
                debug!(path = %path.display(), title = %page.title, "loaded canon page");
                builder.add_canon(page.with_source(path))?;
            }
            Err(err) => skip_unparsable(&mut builder, &path, err),
        }
    }

    if campaigns_root.is_dir() {
        for (campaign, dir) in campaign_dirs(campaigns_root, &mut builder)? {
            builder.add_campaign(campaign.clone());
            for path in markdown_files(&dir, cancel)? {
                cancel.check()?;
                if is_reserved(&path) {
                    continue;
                }
                let Some(title) = title_from_path(&path) else {
                    continue;
                };
                let Some(text) = read_document(&path, &mut builder)? else {
                    continue;
                };
                match Overlay::parse(campaign.clone(), title, &text) {
                    Ok(overlay) => {
                        debug!(campaign = %campaign, path = %path.display(), title = %overlay.title, "loaded overlay");
                        builder.add_overlay(overlay.with_source(path))?;
                    }
                    Err(err) => skip_unparsable(&mut builder, &path, err),
                }
            }
        }
    } else {
        debug!(path = %campaigns_root.display(), "no campaigns directory");
    }

    let snapshot = builder.build();
    info!(
        canon = snapshot.canon_count(),
        overlays = snapshot.overlay_count(),
        skipped = snapshot.report().len(),
        duration_ms = started_at.elapsed().as_millis() as u64,
        "snapshot loaded"
    );
    Ok(snapshot)
}

/// Markdown files under `root`, recursively, in file-name order. Hidden
/// entries are skipped.
fn markdown_files(root: &Path, cancel: &CancelFlag) -> StoreResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        cancel.check()?;
        let entry = entry.map_err(|err| StoreError::Io {
            path: err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
            source: err.into(),
        })?;
        let is_markdown = entry.path().extension().is_some_and(|ext| ext == "md");
        if entry.file_type().is_file() && is_markdown {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Immediate subdirectories of the campaigns root, in name order.
fn campaign_dirs(root: &Path, builder: &mut SnapshotBuilder) -> StoreResult<Vec<(CampaignId, PathBuf)>> {
    let io_err = |source| StoreError::Io {
        path: root.to_path_buf(),
        source,
    };

    let mut entries = std::fs::read_dir(root)
        .map_err(io_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut campaigns = Vec::new();
    for entry in entries {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        match CampaignId::new(name) {
            Ok(campaign) => campaigns.push((campaign, path)),
            Err(err) => {
                warn!(path = %path.display(), "skipping directory: {err}");
                builder
                    .report_mut()
                    .warn(IssueKind::InvalidCampaign, path.display().to_string(), err);
            }
        }
    }
    Ok(campaigns)
}

/// Read a document. Non-UTF-8 files are skipped like unparsable ones.
fn read_document(path: &Path, builder: &mut SnapshotBuilder) -> StoreResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
            warn!(path = %path.display(), "skipping document: not valid UTF-8");
            builder
                .report_mut()
                .warn(IssueKind::ParseError, path.display().to_string(), "not valid UTF-8");
            Ok(None)
        }
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn skip_unparsable(builder: &mut SnapshotBuilder, path: &Path, err: campaign_pages::ParseError) {
    warn!(path = %path.display(), "skipping document: {err}");
    builder
        .report_mut()
        .warn(IssueKind::ParseError, path.display().to_string(), err);
}

/// Dashboards and generated files start with `_` and are never overlays.
fn is_reserved(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('_'))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}
