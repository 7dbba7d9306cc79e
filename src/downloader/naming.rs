// File naming - slugs, sanitized titles and collision planning

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};

use super::errors::DownloadError;
use super::models::MaterializedFile;

/// Stem used when a title has nothing usable in it
pub const FALLBACK_STEM: &str = "untitled";

const MAX_STEM_CHARS: usize = 200;

lazy_static::lazy_static! {
    static ref NON_ALNUM_RE: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
    static ref ILLEGAL_RE: Regex = Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).unwrap();
}

/// ASCII, lowercase, `-`-separated slug of a title.
///
/// `"My Song! (Live)"` becomes `"my-song-live"`.
pub fn slugify(title: &str) -> String {
    let ascii = deunicode::deunicode(title).to_lowercase();
    let slug = NON_ALNUM_RE.replace_all(&ascii, "-");
    let slug = slug.trim_matches('-');

    if slug.is_empty() {
        return FALLBACK_STEM.to_string();
    }
    truncate(slug).trim_end_matches('-').to_string()
}

/// Title with only filesystem-illegal characters replaced.
/// Used as the pre-rename name of a materialized file.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned = ILLEGAL_RE.replace_all(title, "_");
    let cleaned = cleaned.trim().trim_end_matches('.').trim();

    if cleaned.is_empty() {
        return FALLBACK_STEM.to_string();
    }
    truncate(cleaned).trim_end().to_string()
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(MAX_STEM_CHARS) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Names assigned to one item before dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedName {
    /// Pre-rename stem the materializer writes to
    pub staging: String,
    /// Final slug stem
    pub slug: String,
}

impl PlannedName {
    pub fn for_title(title: &str) -> Self {
        Self {
            staging: sanitize_filename(title),
            slug: slugify(title),
        }
    }

    /// Stem of the file the item ends up as
    pub fn final_stem(&self, rename: bool) -> &str {
        if rename {
            &self.slug
        } else {
            &self.staging
        }
    }
}

/// Collision-free names for a whole collection.
///
/// Planned in input order: the first item keeps its slug, the n-th later
/// duplicate becomes `<slug>-<n>`. Staging names are unique among
/// themselves and never equal another item's final slug, so no item can
/// stage onto a file a sibling renames into place.
pub struct NamePlan;

impl NamePlan {
    pub fn for_titles<'a>(titles: impl IntoIterator<Item = &'a str>) -> Vec<PlannedName> {
        let titles: Vec<&str> = titles.into_iter().collect();
        let slugs = disambiguate(
            titles.iter().map(|t| slugify(t)).collect(),
            |name, n| format!("{}-{}", name, n),
        );
        let slug_keys: HashSet<String> = slugs.iter().map(|s| s.to_lowercase()).collect();

        let mut taken = HashSet::new();
        titles
            .iter()
            .zip(slugs)
            .map(|(title, slug)| {
                let base = sanitize_filename(title);
                let own = slug.to_lowercase();
                let mut staging = base.clone();
                let mut n = 1;
                loop {
                    let key = staging.to_lowercase();
                    let foreign_slug = key != own && slug_keys.contains(&key);
                    if !foreign_slug && taken.insert(key) {
                        break;
                    }
                    n += 1;
                    staging = format!("{} ({})", base, n);
                }
                PlannedName { staging, slug }
            })
            .collect()
    }
}

fn disambiguate(names: Vec<String>, suffixed: impl Fn(&str, usize) -> String) -> Vec<String> {
    let mut taken = HashSet::new();

    names
        .into_iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut n = 1;
            // Case-insensitive filesystems treat "A" and "a" as one file
            while !taken.insert(candidate.to_lowercase()) {
                n += 1;
                candidate = suffixed(&name, n);
            }
            candidate
        })
        .collect()
}

/// Path `<dir>/<stem>.<ext>`
pub fn path_with_stem(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    if ext.is_empty() {
        dir.join(stem)
    } else {
        dir.join(format!("{}.{}", stem, ext))
    }
}

/// Rename a materialized file to `<stem>.<original ext>` in the same directory.
///
/// A stale file at the target is replaced.
pub async fn rename_to_stem(file: &MaterializedFile, stem: &str) -> Result<PathBuf, DownloadError> {
    let dir = file.path.parent().unwrap_or_else(|| Path::new("."));
    let ext = file
        .path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target = path_with_stem(dir, stem, &ext);

    if target == file.path {
        debug!(path = %target.display(), "Name already final");
        return Ok(target);
    }

    // On case-insensitive filesystems a case-only rename sees its own source here
    let same_entry = target.to_string_lossy().to_lowercase()
        == file.path.to_string_lossy().to_lowercase();
    if !same_entry && tokio::fs::try_exists(&target).await.unwrap_or(false) {
        debug!(path = %target.display(), "Replacing stale file at rename target");
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| DownloadError::fs(&target, e))?;
    }

    tokio::fs::rename(&file.path, &target)
        .await
        .map_err(|e| DownloadError::fs(&file.path, e))?;

    info!(title = %file.title, to = %target.display(), "Renamed");
    Ok(target)
}

/// Rename a materialized file to the slug of its title
pub async fn sanitize_and_rename(file: &MaterializedFile) -> Result<PathBuf, DownloadError> {
    rename_to_stem(file, &slugify(&file.title)).await
}
