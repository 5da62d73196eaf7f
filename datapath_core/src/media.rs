//! Media resolution for content and icon references.
//!
//! Content references in a point file are loose relative paths written by
//! the recording tool (`"saved/walk/IMG_0042.jpg"`, `"public/clips/a.mp4"`).
//! They are cleaned, classified by extension, and looked up under the
//! resource root, with a file-name search as fallback.

use crate::config::{MediaSettings, VideoSource};
use crate::error::MediaError;
use datapath_env::is_remote;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Kind of medium, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediumKind {
    Image,
    Video,
    Audio,
}

impl MediumKind {
    /// Kind for a bare extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" | "jif" | "jfif" | "jfi" | "png" | "webp" | "psd" => {
                Some(Self::Image)
            }
            "mp4" | "mov" => Some(Self::Video),
            "mp3" | "wav" => Some(Self::Audio),
            _ => None,
        }
    }

    /// Kind for a path or URL.
    pub fn classify(reference: &str) -> Option<Self> {
        Path::new(reference)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// A resolved file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaAsset {
    /// Location on disk
    pub path: PathBuf,

    /// Display name: last component of the raw reference
    pub name: String,
}

/// The medium attached to a SubPath.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Medium {
    /// No medium, or resolution failed
    #[default]
    None,
    Image(MediaAsset),
    VideoFile(MediaAsset),
    /// Remote URL or streaming-directory path
    VideoUrl { url: String },
    Audio(MediaAsset),
}

impl Medium {
    pub fn kind(&self) -> Option<MediumKind> {
        match self {
            Self::None => None,
            Self::Image(_) => Some(MediumKind::Image),
            Self::VideoFile(_) | Self::VideoUrl { .. } => Some(MediumKind::Video),
            Self::Audio(_) => Some(MediumKind::Audio),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// True if presentation needs a "prepared" signal before playback.
    pub fn is_video(&self) -> bool {
        self.kind() == Some(MediumKind::Video)
    }
}

/// Resolves raw references to media.
///
/// `base_dir` is the directory of the point file; references are relative
/// to it.
pub trait MediaResolver {
    /// Resolves a content reference.
    fn resolve(&self, content: &str, base_dir: &str) -> Result<Medium, MediaError>;

    /// Resolves an icon reference. Icons must be images.
    fn resolve_icon(&self, icon: &str, base_dir: &str) -> Result<MediaAsset, MediaError> {
        match self.resolve(icon, base_dir)? {
            Medium::Image(asset) => Ok(asset),
            _ => Err(MediaError::WrongKind {
                expected: "image",
                path: icon.to_string(),
            }),
        }
    }
}

/// Normalizes a raw reference relative to its base directory.
///
/// Joins `base_dir/raw`, strips the resource prefix and every skipped
/// fragment, and optionally drops the file extension.
pub fn clean_reference(raw: &str, base_dir: &str, settings: &MediaSettings, keep_extension: bool) -> String {
    let mut cleaned = if base_dir.is_empty() {
        raw.replace('\\', "/")
    } else {
        format!("{}/{}", base_dir.trim_end_matches('/'), raw).replace('\\', "/")
    };

    if !settings.resource_prefix.is_empty() {
        cleaned = cleaned.replace(&settings.resource_prefix, "");
    }
    for word in &settings.skipped_words {
        cleaned = cleaned.replace(word.as_str(), "");
    }

    if !keep_extension {
        let name_start = cleaned.rfind('/').map(|i| i + 1).unwrap_or(0);
        if let Some(dot) = cleaned[name_start..].rfind('.') {
            if dot > 0 {
                cleaned.truncate(name_start + dot);
            }
        }
    }
    cleaned.trim_start_matches('/').to_string()
}

/// Display name of a raw reference: its last path component.
pub fn display_name(raw: &str) -> String {
    raw.replace('\\', "/")
        .rsplit('/')
        .next()
        .unwrap_or(raw)
        .to_string()
}

/// Video URL for a raw reference.
///
/// With a web server configured the cleaned path is appended to it; a raw
/// web address is used as-is; anything else stays a streaming-relative path.
pub fn video_url(raw: &str, base_dir: &str, settings: &MediaSettings) -> String {
    let cleaned = clean_reference(raw, base_dir, settings, true);
    match settings.server_url.as_deref() {
        Some(server) if is_remote(server) => format!("{}/{}", server.trim_end_matches('/'), cleaned),
        _ if is_remote(raw) => raw.to_string(),
        _ => cleaned,
    }
}

/// Expands a streaming-relative video URL against the streaming root.
///
/// Web addresses pass through unchanged.
pub fn expand_streaming_url(url: &str, streaming_root: &Path) -> String {
    if is_remote(url) {
        return url.to_string();
    }
    let relative = match url.find("StreamingAssets/") {
        Some(i) => &url[i + "StreamingAssets/".len()..],
        None => url,
    };
    streaming_root.join(relative).to_string_lossy().into_owned()
}

/// Filesystem resolver rooted at `MediaSettings::resource_root`.
#[derive(Debug, Clone)]
pub struct FileMediaResolver {
    settings: MediaSettings,
}

impl FileMediaResolver {
    pub fn new(settings: MediaSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MediaSettings {
        &self.settings
    }

    /// Looks up `cleaned` (extension stripped) with the given kind.
    fn locate(&self, cleaned: &str, kind: MediumKind) -> Option<PathBuf> {
        let root = &self.settings.resource_root;
        let stem_path = root.join(cleaned);
        let (dir, stem) = match (stem_path.parent(), stem_path.file_name()) {
            (Some(dir), Some(stem)) => (dir.to_path_buf(), stem.to_string_lossy().into_owned()),
            _ => return None,
        };

        if let Some(found) = find_in_dir(&dir, &stem, kind) {
            return Some(found);
        }

        if !self.settings.search_directory {
            return None;
        }

        // Search the first directory of the reference, recursively.
        let first = cleaned.split('/').next().filter(|f| !f.is_empty() && *f != cleaned);
        let search_root = match first {
            Some(first) => root.join(first),
            None => root.clone(),
        };
        debug!("Searching {} for {}", search_root.display(), stem);
        search_dir(&search_root, &stem, kind)
    }
}

impl MediaResolver for FileMediaResolver {
    fn resolve(&self, content: &str, base_dir: &str) -> Result<Medium, MediaError> {
        let kind = MediumKind::classify(content)
            .ok_or_else(|| MediaError::UnknownType(content.to_string()))?;

        if kind == MediumKind::Video && self.settings.video_source == VideoSource::Url {
            return Ok(Medium::VideoUrl {
                url: video_url(content, base_dir, &self.settings),
            });
        }

        let cleaned = clean_reference(content, base_dir, &self.settings, false);
        let path = self.locate(&cleaned, kind).ok_or_else(|| {
            warn!("Could not find {} {} (cleaned: {})", kind.name(), content, cleaned);
            MediaError::not_found(content)
        })?;

        debug!("Loaded {} {} from {}", kind.name(), content, path.display());
        let asset = MediaAsset {
            path,
            name: display_name(content),
        };
        Ok(match kind {
            MediumKind::Image => Medium::Image(asset),
            MediumKind::Video => Medium::VideoFile(asset),
            MediumKind::Audio => Medium::Audio(asset),
        })
    }
}

/// A file in `dir` whose stem equals `stem` and whose extension is of `kind`.
fn find_in_dir(dir: &Path, stem: &str, kind: MediumKind) -> Option<PathBuf> {
    let read_dir = std::fs::read_dir(dir).ok()?;
    let mut matches: Vec<PathBuf> = read_dir
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && matches_stem(path, stem, kind))
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Recursive variant of `find_in_dir`.
fn search_dir(dir: &Path, stem: &str, kind: MediumKind) -> Option<PathBuf> {
    if let Some(found) = find_in_dir(dir, stem, kind) {
        return Some(found);
    }
    let Ok(read_dir) = std::fs::read_dir(dir) else { return None };
    let mut subdirs: Vec<PathBuf> = read_dir
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();
    subdirs.iter().find_map(|sub| search_dir(sub, stem, kind))
}

fn matches_stem(path: &Path, stem: &str, kind: MediumKind) -> bool {
    let same_stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case(stem))
        .unwrap_or(false);
    same_stem && path.to_str().and_then(MediumKind::classify) == Some(kind)
}

/// Deduplicated icon images shared by all SubPaths of a path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IconRegistry {
    icons: Vec<MediaAsset>,
}

impl IconRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an icon, returning its index. Icons with the same display
    /// name share one entry.
    pub fn register(&mut self, asset: MediaAsset) -> usize {
        if let Some(index) = self.index_of(&asset.name) {
            return index;
        }
        self.icons.push(asset);
        self.icons.len() - 1
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.icons.iter().position(|icon| icon.name == name)
    }

    pub fn get(&self, index: usize) -> Option<&MediaAsset> {
        self.icons.get(index)
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaAsset> {
        self.icons.iter()
    }
}
