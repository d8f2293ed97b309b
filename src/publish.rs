/// publish.rs — Zip-based static-site publisher.
///
/// Pipeline: read the uploaded archive → detect its layout prefix →
/// materialize entries into a staging directory inside a non-served work
/// area on the target's filesystem → verify the entry point → atomically
/// swap the staging tree into place.
/// A failed publish never destroys the previously published site.
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

use tracing::{info, warn};
use zip::ZipArchive;

use crate::error::{PublishError, Result};

/// One entry of the uploaded archive. Paths use forward slashes.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    pub is_dir: bool,
    pub data: Vec<u8>,
}

// The size in the zip header is whatever the uploader wrote there; cap how
// much we preallocate from it and let the vector grow to the real size.
const MAX_ENTRY_PREALLOC: u64 = 1024 * 1024;

/// Decompress the archive into memory and list its entries.
pub fn read_archive(bytes: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| PublishError::MalformedArchive(e.to_string()))?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| PublishError::MalformedArchive(e.to_string()))?;
        let path = file.name().to_string();
        let is_dir = file.is_dir();
        let mut data = Vec::new();
        if !is_dir {
            data.reserve(file.size().min(MAX_ENTRY_PREALLOC) as usize);
            file.read_to_end(&mut data)
                .map_err(|e| PublishError::MalformedArchive(e.to_string()))?;
        }
        entries.push(ArchiveEntry { path, is_dir, data });
    }
    Ok(entries)
}

/// Find the common leading path segment to strip from every entry.
///
/// `Some("")` means the entry point sits at the archive root, `Some(prefix)`
/// means all content is wrapped under `prefix` (trailing slash included),
/// `None` means the entry point does not exist anywhere — extraction still
/// proceeds so the rejected tree can be inspected, and validation fails later.
///
/// When several entries at different depths qualify, the shallowest wins;
/// two equally shallow candidates are rejected as ambiguous rather than
/// resolved by iteration order.
pub fn detect_prefix(entries: &[ArchiveEntry], entry_point: &str) -> Result<Option<String>> {
    if entries
        .iter()
        .any(|e| !e.is_dir && e.path == entry_point)
    {
        return Ok(Some(String::new()));
    }

    let suffix = format!("/{entry_point}");
    let mut candidates: Vec<&str> = entries
        .iter()
        .filter(|e| !e.is_dir && e.path.ends_with(&suffix))
        .map(|e| &e.path[..e.path.len() - entry_point.len()])
        .collect();
    if candidates.is_empty() {
        return Ok(None);
    }

    candidates.sort_by_key(|p| (p.matches('/').count(), p.to_string()));
    let min_depth = candidates[0].matches('/').count();
    let shallowest: Vec<&str> = candidates
        .iter()
        .copied()
        .filter(|p| p.matches('/').count() == min_depth)
        .collect();
    if shallowest.len() > 1 {
        return Err(PublishError::AmbiguousLayout {
            expected: entry_point.to_string(),
            candidates: shallowest.iter().map(|p| format!("{p}{entry_point}")).collect(),
        });
    }
    Ok(Some(shallowest[0].to_string()))
}

/// Resolve an entry's relative path against `base`, refusing anything that
/// would land outside it (zip-slip).
fn sanitize_entry_path(rel: &str, entry: &str, base: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PublishError::PathTraversal {
                    entry: entry.to_string(),
                });
            }
        }
    }
    let resolved = base.join(&out);
    if !resolved.starts_with(base) {
        return Err(PublishError::PathTraversal {
            entry: entry.to_string(),
        });
    }
    Ok(resolved)
}

/// Write every file entry under `dest`, stripping `prefix` first.
/// Directory entries are skipped; the paths of file entries imply them.
pub fn materialize(entries: &[ArchiveEntry], prefix: &str, dest: &Path) -> Result<()> {
    for entry in entries {
        if entry.is_dir {
            continue;
        }
        let rel = match entry.path.strip_prefix(prefix) {
            Some(stripped) if !prefix.is_empty() => stripped,
            _ => entry.path.as_str(),
        };
        // The prefix directory marker itself strips down to nothing.
        if rel.is_empty() {
            continue;
        }
        let target = sanitize_entry_path(rel, &entry.path, dest)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| PublishError::Write {
                path: target.display().to_string(),
                source: e,
            })?;
        }
        fs::write(&target, &entry.data).map_err(|e| PublishError::Write {
            path: target.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}

/// Publishes uploaded site archives into a fixed target directory.
///
/// Staging, swap bookkeeping, and rejected trees live in `work_dir`, which
/// must sit on the same filesystem as the target and must not be served.
#[derive(Debug, Clone)]
pub struct SitePublisher {
    target: PathBuf,
    work_dir: PathBuf,
    site_prefix: String,
    entry_point: String,
}

impl SitePublisher {
    pub fn new(
        target: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
        site_prefix: impl Into<String>,
        entry_point: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            work_dir: work_dir.into(),
            site_prefix: site_prefix.into(),
            entry_point: entry_point.into(),
        }
    }

    /// Run the full publish pipeline on one uploaded archive.
    ///
    /// On success the new site is live at the returned public path. Callers
    /// must serialize invocations against the same target; the server holds
    /// an async lock around this call.
    pub fn publish(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        if !filename.to_ascii_lowercase().ends_with(".zip") {
            return Err(PublishError::NotAnArchive);
        }
        if bytes.len() < 2 || &bytes[..2] != b"PK" {
            return Err(PublishError::NotAnArchive);
        }

        let entries = read_archive(bytes)?;
        let prefix = detect_prefix(&entries, &self.entry_point)?;
        if let Some(ref p) = prefix {
            if !p.is_empty() {
                info!("📦 Archive wraps content under '{p}' — stripping");
            }
        }

        if let Some(parent) = self.target.parent() {
            fs::create_dir_all(parent).map_err(|e| PublishError::PublishTarget { source: e })?;
        }
        fs::create_dir_all(&self.work_dir)
            .map_err(|e| PublishError::PublishTarget { source: e })?;

        // Same filesystem as the target, so the final rename is atomic.
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.work_dir)
            .map_err(|e| PublishError::PublishTarget { source: e })?;

        materialize(&entries, prefix.as_deref().unwrap_or(""), staging.path())?;

        if !staging.path().join(&self.entry_point).is_file() {
            self.preserve_rejected(staging);
            return Err(PublishError::MissingEntryPoint {
                expected: self.entry_point.clone(),
            });
        }

        self.swap_into_place(staging)?;
        info!("✅ Published {} entries to {}", entries.len(), self.target.display());
        Ok(format!(
            "{}/{}",
            self.site_prefix.trim_end_matches('/'),
            self.entry_point
        ))
    }

    fn work_path(&self, suffix: &str) -> PathBuf {
        let name = self
            .target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "site".to_string());
        self.work_dir.join(format!("{name}.{suffix}"))
    }

    /// Keep a failed materialization in the work directory for inspection
    /// instead of letting the tempdir clean it up.
    fn preserve_rejected(&self, staging: tempfile::TempDir) {
        let rejected = self.work_path("rejected");
        let _ = fs::remove_dir_all(&rejected);
        let staged = staging.into_path();
        if let Err(e) = fs::rename(&staged, &rejected) {
            warn!("could not preserve rejected upload: {e}");
            let _ = fs::remove_dir_all(&staged);
        } else {
            info!("rejected upload kept at {}", rejected.display());
        }
    }

    /// Replace the live target with the staged tree: move the old site aside,
    /// rename the staging dir in, then drop the old site. If the final rename
    /// fails the old site is restored.
    fn swap_into_place(&self, staging: tempfile::TempDir) -> Result<()> {
        let staged = staging.into_path();
        let old = self.work_path("old");
        if old.exists() {
            fs::remove_dir_all(&old).map_err(|e| PublishError::PublishTarget { source: e })?;
        }
        if self.target.exists() {
            if let Err(e) = fs::rename(&self.target, &old) {
                let _ = fs::remove_dir_all(&staged);
                return Err(PublishError::PublishTarget { source: e });
            }
        }
        match fs::rename(&staged, &self.target) {
            Ok(()) => {
                if old.exists() {
                    let _ = fs::remove_dir_all(&old);
                }
                Ok(())
            }
            Err(e) => {
                if old.exists() {
                    let _ = fs::rename(&old, &self.target);
                }
                let _ = fs::remove_dir_all(&staged);
                Err(PublishError::PublishTarget { source: e })
            }
        }
    }
}
