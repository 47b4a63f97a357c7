//! Rendering descriptors through a target, and writing the result to disk.
//!
//! Rendering is pure: identical inputs give byte-identical files. Writing is
//! all-or-nothing across the rendered set.

use crate::codegen::pattern::PatternSet;
use crate::codegen::target::{GenerationTarget, find_target};
use crate::core::descriptor::{EntityDescriptor, validate_all};
use crate::core::error::ScdError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

const STAGING_SUFFIX: &str = ".scdkit-tmp";
const BACKUP_SUFFIX: &str = ".scdkit-bak";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedFile {
    /// Relative to the output directory.
    pub path: String,
    #[serde(skip)]
    pub contents: String,
    pub entities: Vec<String>,
    pub patterns: Vec<String>,
}

impl RenderedFile {
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.contents.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Renders every descriptor through `target`. Fragments sharing a location
/// land in one file, in descriptor order then pattern order. Any missing
/// mapping fails the whole run before a single fragment is produced.
pub fn render(
    patterns: &PatternSet,
    target: &GenerationTarget,
    descriptors: &[EntityDescriptor],
) -> Result<Vec<RenderedFile>, ScdError> {
    if patterns.is_empty() {
        return Err(ScdError::ValidationError(
            "Nothing to render: the pattern set is empty".to_string(),
        ));
    }
    target.ensure_covers(patterns)?;
    validate_all(descriptors)?;

    let mut by_location: BTreeMap<String, RenderedFile> = BTreeMap::new();
    for desc in descriptors {
        let location = (target.location)(desc);
        check_relative(target, &location)?;

        let file = by_location
            .entry(location.clone())
            .or_insert_with(|| RenderedFile {
                path: location.clone(),
                contents: (target.header)(desc, patterns),
                entities: Vec::new(),
                patterns: patterns.iter().map(|p| p.name().to_string()).collect(),
            });
        file.entities.push(desc.name.clone());

        for pattern in patterns.iter() {
            let render_fn = target.renderer(pattern).ok_or_else(|| ScdError::MissingMapping {
                target: target.name.to_string(),
                pattern: pattern.name().to_string(),
            })?;
            file.contents.push('\n');
            file.contents.push_str(&render_fn(desc));
        }
        tracing::debug!(target = target.name, entity = %desc.name, path = %location, "rendered");
    }

    Ok(by_location.into_values().collect())
}

/// Resolves `target_name` against the compiled-in table, then renders.
pub fn render_target(
    patterns: &PatternSet,
    target_name: &str,
    descriptors: &[EntityDescriptor],
) -> Result<Vec<RenderedFile>, ScdError> {
    let target = find_target(target_name)?;
    render(patterns, target, descriptors)
}

fn check_relative(target: &GenerationTarget, location: &str) -> Result<(), ScdError> {
    let path = Path::new(location);
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || location.is_empty() {
        return Err(ScdError::ValidationError(format!(
            "Target '{}' produced an output location outside the output directory: '{}'",
            target.name, location
        )));
    }
    Ok(())
}

// --- Writing ---

/// Output directory plus the overwrite policy.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub out_dir: PathBuf,
    /// Overwrite files whose contents differ.
    pub force: bool,
    /// Report what would happen without touching the filesystem.
    pub dry_run: bool,
    /// Compare against disk and fail on any difference; never writes.
    pub check: bool,
}

impl WriteOptions {
    pub fn new(out_dir: &Path) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
            force: false,
            dry_run: false,
            check: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Wrote,
    Unchanged,
    WouldWrite,
    WouldOverwrite,
    Checked,
}

impl FileAction {
    pub fn label(self) -> &'static str {
        match self {
            FileAction::Wrote => "wrote",
            FileAction::Unchanged => "unchanged",
            FileAction::WouldWrite => "would-write",
            FileAction::WouldOverwrite => "would-overwrite",
            FileAction::Checked => "up-to-date",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteEntry {
    pub path: PathBuf,
    pub action: FileAction,
    pub digest: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteReport {
    pub entries: Vec<WriteEntry>,
}

impl WriteReport {
    pub fn count(&self, action: FileAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum DiskState {
    Missing,
    Same,
    Different,
}

fn disk_state(dest: &Path, contents: &str) -> Result<DiskState, ScdError> {
    if !dest.exists() {
        return Ok(DiskState::Missing);
    }
    let on_disk = fs::read(dest)?;
    Ok(if on_disk == contents.as_bytes() {
        DiskState::Same
    } else {
        DiskState::Different
    })
}

/// Writes the rendered set under `opts.out_dir`. Every file is planned first;
/// an existing file with different contents and no `force` fails the call
/// before anything is written. Files are staged next to their destination and
/// renamed into place. A failure while staging removes every staged file; a
/// failure while renaming also restores every destination already replaced.
pub fn write_rendered(
    files: &[RenderedFile],
    opts: &WriteOptions,
) -> Result<WriteReport, ScdError> {
    let mut plan = Vec::with_capacity(files.len());
    for file in files {
        let dest = opts.out_dir.join(&file.path);
        let state = disk_state(&dest, &file.contents)?;
        plan.push((file, dest, state));
    }

    if opts.check {
        let drifted: Vec<String> = plan
            .iter()
            .filter(|(_, _, state)| *state != DiskState::Same)
            .map(|(_, dest, state)| match state {
                DiskState::Missing => format!("{} (missing)", dest.display()),
                _ => format!("{} (stale)", dest.display()),
            })
            .collect();
        if !drifted.is_empty() {
            return Err(ScdError::ValidationError(format!(
                "Generated output is out of date; re-run generate: {}",
                drifted.join(", ")
            )));
        }
        return Ok(report(&plan, |_| FileAction::Checked));
    }

    if !opts.force {
        if let Some((_, dest, _)) = plan.iter().find(|(_, _, s)| *s == DiskState::Different) {
            return Err(ScdError::ValidationError(format!(
                "Refusing to overwrite existing path without --force: {}",
                dest.display()
            )));
        }
    }

    if opts.dry_run {
        return Ok(report(&plan, |state| match state {
            DiskState::Missing => FileAction::WouldWrite,
            DiskState::Different => FileAction::WouldOverwrite,
            DiskState::Same => FileAction::Unchanged,
        }));
    }

    let pending: Vec<&(&RenderedFile, PathBuf, DiskState)> =
        plan.iter().filter(|(_, _, s)| *s != DiskState::Same).collect();

    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(pending.len());
    for (file, dest, _) in &pending {
        let tmp = sibling(dest, STAGING_SUFFIX);
        let result = ensure_parent(dest).and_then(|_| fs::write(&tmp, &file.contents).map_err(ScdError::IoError));
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            discard(&staged);
            return Err(e);
        }
        staged.push((tmp, dest.as_path()));
    }

    commit(&staged)?;

    tracing::info!(
        out_dir = %opts.out_dir.display(),
        written = staged.len(),
        "generation written"
    );
    Ok(report(&plan, |state| match state {
        DiskState::Same => FileAction::Unchanged,
        _ => FileAction::Wrote,
    }))
}

fn report<F>(plan: &[(&RenderedFile, PathBuf, DiskState)], action: F) -> WriteReport
where
    F: Fn(&DiskState) -> FileAction,
{
    WriteReport {
        entries: plan
            .iter()
            .map(|(file, dest, state)| WriteEntry {
                path: dest.clone(),
                action: action(state),
                digest: file.digest(),
            })
            .collect(),
    }
}

fn sibling(dest: &Path, suffix: &str) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Renames every staged file onto its destination. On failure the destinations
/// replaced so far get their previous contents back and nothing staged remains.
fn commit(staged: &[(PathBuf, &Path)]) -> Result<(), ScdError> {
    let mut done: Vec<(&Path, Option<PathBuf>)> = Vec::with_capacity(staged.len());
    for (i, (tmp, dest)) in staged.iter().enumerate() {
        match replace(tmp, dest) {
            Ok(backup) => done.push((*dest, backup)),
            Err(e) => {
                rollback(&done);
                discard(&staged[i..]);
                return Err(ScdError::IoError(e));
            }
        }
    }
    for (_, backup) in &done {
        if let Some(bak) = backup {
            let _ = fs::remove_file(bak);
        }
    }
    Ok(())
}

/// Moves `tmp` onto `dest`, keeping an existing `dest` aside as a backup.
fn replace(tmp: &Path, dest: &Path) -> io::Result<Option<PathBuf>> {
    let backup = if dest.exists() {
        let bak = sibling(dest, BACKUP_SUFFIX);
        fs::rename(dest, &bak)?;
        Some(bak)
    } else {
        None
    };
    if let Err(e) = fs::rename(tmp, dest) {
        if let Some(bak) = &backup {
            let _ = fs::rename(bak, dest);
        }
        return Err(e);
    }
    Ok(backup)
}

fn rollback(done: &[(&Path, Option<PathBuf>)]) {
    for (dest, backup) in done.iter().rev() {
        match backup {
            Some(bak) => {
                let _ = fs::rename(bak, dest);
            }
            None => {
                let _ = fs::remove_file(dest);
            }
        }
    }
}

fn discard(staged: &[(PathBuf, &Path)]) {
    for (tmp, _) in staged {
        let _ = fs::remove_file(tmp);
    }
}

fn ensure_parent(path: &Path) -> Result<(), ScdError> {
    if let Some(p) = path.parent() {
        fs::create_dir_all(p).map_err(ScdError::IoError)?;
    }
    Ok(())
}
