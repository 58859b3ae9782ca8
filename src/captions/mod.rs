//! Conversion of WebVTT subtitle tracks into continuous plain text, and
//! organization of downloaded transcript files by language.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::Result;

static TIMING_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\d{2}:\d{2}:\d{2}\.\d{3}>").unwrap());
static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static LANG_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.([a-z]{2,3}(?:-[a-zA-Z0-9]{2,8})?)\.(vtt|txt)$").unwrap());

/// Convert the full text of a WebVTT document to continuous plain text.
///
/// Cue text is stripped of inline timing tags and markup, whitespace runs are
/// collapsed, and all cues are joined with single spaces. Timing information
/// is intentionally discarded. Malformed input degrades gracefully; a
/// header-only or empty document yields an empty string.
pub fn vtt_to_text(vtt: &str) -> String {
    let lines: Vec<&str> = vtt.lines().collect();
    let mut collected: Vec<String> = Vec::new();
    let mut in_cue = false;

    for (i, raw) in lines.iter().enumerate() {
        let line = raw.trim();

        // Header and metadata lines carry no cue text, in any state
        if line == "WEBVTT"
            || line == "NOTE"
            || line.starts_with("NOTE ")
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
        {
            continue;
        }

        // A time-range line opens a cue block; it contributes no text
        if line.contains("-->") {
            in_cue = true;
            continue;
        }

        // An empty line closes the current cue block
        if line.is_empty() {
            in_cue = false;
            continue;
        }

        // A non-empty line directly before a time-range line is the cue's
        // identifier, not text
        let next_is_timing = lines
            .get(i + 1)
            .map_or(false, |next| next.contains("-->"));
        if next_is_timing {
            continue;
        }

        if !in_cue {
            continue;
        }

        let cleaned = TIMING_TAG.replace_all(line, "");
        let cleaned = MARKUP_TAG.replace_all(&cleaned, "");
        let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        if !cleaned.is_empty() {
            collected.push(cleaned);
        }
    }

    collected.join(" ").trim().to_string()
}

/// Convert a `.vtt` file on disk to a sibling `.txt` file.
///
/// Returns the path of the written plain-text file.
pub fn convert_file(vtt_path: &Path) -> Result<PathBuf> {
    let content = fs_err::read_to_string(vtt_path)?;
    let text = vtt_to_text(&content);

    let txt_path = vtt_path.with_extension("txt");
    fs_err::write(&txt_path, text)?;

    tracing::debug!(
        "converted {} -> {}",
        vtt_path.display(),
        txt_path.display()
    );

    Ok(txt_path)
}

/// The transcript files available for one language
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptTracks {
    /// Human-authored subtitle track
    pub manual: Option<PathBuf>,
    /// Automatically generated track (filename carries an `-auto` marker)
    pub auto: Option<PathBuf>,
}

/// Transcript files grouped by language code.
///
/// Filenames follow the `<title> [<id>].<lang>[-auto].<ext>` convention;
/// `<lang>-auto` and `<lang>` land in the same language bucket with
/// different provenance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptSet(BTreeMap<String, TranscriptTracks>);

impl TranscriptSet {
    /// Classify a list of downloaded transcript paths
    pub fn classify<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut set = Self::default();
        for path in paths {
            set.insert(path);
        }
        set
    }

    fn insert(&mut self, path: &Path) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        let Some(caps) = LANG_SUFFIX.captures(name) else {
            return;
        };

        let code = &caps[1];
        let (language, auto) = match code.strip_suffix("-auto") {
            Some(language) => (language, true),
            None => (code, false),
        };

        let tracks = self.0.entry(language.to_string()).or_default();
        if auto {
            tracks.auto = Some(path.to_path_buf());
        } else {
            tracks.manual = Some(path.to_path_buf());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Languages with their tracks, ordered by language code
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TranscriptTracks)> {
        self.0.iter().map(|(lang, tracks)| (lang.as_str(), tracks))
    }

    pub fn get(&self, language: &str) -> Option<&TranscriptTracks> {
        self.0.get(language)
    }
}
