//! Filename parsing into a structured identity guess.
//!
//! Turns a media file path into a [`ParsedIdentity`]: best-effort title,
//! optional year, season/episode numbers, and the release noise tokens that
//! were stripped from the title. Parsing is pure and never fails; anything
//! unrecognizable degrades to [`MediaKind::Unknown`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Kind of media an identity (or a provider candidate) refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Episode,
    Unknown,
}

/// Structured identity guess derived from a filename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedIdentity {
    /// Path the identity was derived from.
    pub raw_path: PathBuf,
    /// Best-effort cleaned title.
    pub title_guess: String,
    /// Release year, when a plausible year token was found.
    pub year: Option<i32>,
    pub media_kind: MediaKind,
    /// Season number; present iff `episode` is present.
    pub season: Option<u32>,
    /// Episode number; present iff `season` is present.
    pub episode: Option<u32>,
    /// Recognized noise tokens (quality, codec, group) removed from the
    /// title, in filename order. Diagnostic only, never used for matching.
    pub release_tags: Vec<String>,
}

static RE_SEASON_EP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[\s._\-\[(])S(\d{1,2})[\s._\-]?E(\d{1,3})").unwrap());
static RE_ALT_SEASON_EP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[\s._\-\[(])(\d{1,2})x(\d{1,3})(?:[\s._\-\])]|$)").unwrap());
static RE_GROUP_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[([^\]]*)\]\s*-?\s*").unwrap());
static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

/// Fixed vocabulary of release/quality/codec tokens stripped from titles.
/// Compared case-insensitively against separator-normalized tokens.
const RELEASE_TOKENS: &[&str] = &[
    "480p", "576p", "720p", "1080p", "2160p", "4k", "8k", "uhd", "hd", "sd",
    "bluray", "blu-ray", "bdrip", "brrip", "dvdrip", "dvd", "webrip", "web-dl",
    "webdl", "web", "hdtv", "hdrip", "cam", "ts", "remux",
    "x264", "x265", "h264", "h265", "avc", "hevc", "av1", "xvid", "divx",
    "aac", "ac3", "eac3", "dts", "truehd", "atmos", "flac", "opus", "mp3",
    "10bit", "8bit", "hdr", "hdr10", "dv", "sdr",
    "proper", "repack", "extended", "unrated", "remastered", "internal",
    "multi", "dual", "dubbed", "subbed", "vostfr", "limited", "complete",
];

/// Parse a path into a [`ParsedIdentity`].
///
/// Recognition order: episode patterns (`S01E02`, `1x02`) win over year
/// detection, which wins over the unknown fallback. A 4-digit token only
/// counts as a year when it falls in a plausible range and at least one
/// alphabetic token precedes it, so numeric titles are not misread as years.
pub fn parse(path: &Path) -> ParsedIdentity {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let mut release_tags = Vec::new();

    // A leading "[Group]" tag is noise regardless of what follows.
    let stem = match RE_GROUP_TAG.captures(stem) {
        Some(caps) => {
            let group = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            if !group.is_empty() {
                release_tags.push(group.to_string());
            }
            &stem[caps.get(0).map(|m| m.end()).unwrap_or(0)..]
        }
        None => stem,
    };

    if let Some((season, episode, title_source)) = find_episode_pattern(stem) {
        let title_guess = clean_title(title_source, &mut release_tags);
        return ParsedIdentity {
            raw_path: path.to_path_buf(),
            title_guess: fallback_title(title_guess, stem),
            year: None,
            media_kind: MediaKind::Episode,
            season: Some(season),
            episode: Some(episode),
            release_tags,
        };
    }

    if let Some((year, title_source)) = find_year_token(stem) {
        let title_guess = clean_title(title_source, &mut release_tags);
        return ParsedIdentity {
            raw_path: path.to_path_buf(),
            title_guess: fallback_title(title_guess, stem),
            year: Some(year),
            media_kind: MediaKind::Movie,
            season: None,
            episode: None,
            release_tags,
        };
    }

    let title_guess = clean_title(stem, &mut release_tags);
    ParsedIdentity {
        raw_path: path.to_path_buf(),
        title_guess: fallback_title(title_guess, stem),
        year: None,
        media_kind: MediaKind::Unknown,
        season: None,
        episode: None,
        release_tags,
    }
}

/// Locate the first `SxxEyy` or `NxM` pattern. Returns season, episode, and
/// the slice preceding the pattern (the title source).
fn find_episode_pattern(stem: &str) -> Option<(u32, u32, &str)> {
    let caps = RE_SEASON_EP
        .captures(stem)
        .or_else(|| RE_ALT_SEASON_EP.captures(stem))?;
    let season: u32 = caps.get(1)?.as_str().parse().ok()?;
    let episode: u32 = caps.get(2)?.as_str().parse().ok()?;
    if season == 0 && episode == 0 {
        return None;
    }
    let start = caps.get(0)?.start();
    Some((season, episode, &stem[..start]))
}

/// Find the first plausible year token with at least one alphabetic token
/// before it. Returns the year and the slice preceding it.
fn find_year_token(stem: &str) -> Option<(i32, &str)> {
    let max_year = chrono::Utc::now().format("%Y").to_string().parse::<i32>().unwrap_or(2100) + 2;
    for m in RE_YEAR.find_iter(stem) {
        // Reject digits embedded in longer numbers (e.g. "12019").
        let before_ok = stem[..m.start()]
            .chars()
            .next_back()
            .map(|c| !c.is_ascii_digit())
            .unwrap_or(true);
        let after_ok = stem[m.end()..]
            .chars()
            .next()
            .map(|c| !c.is_ascii_digit())
            .unwrap_or(true);
        if !before_ok || !after_ok {
            continue;
        }
        let year: i32 = match m.as_str().parse() {
            Ok(y) => y,
            Err(_) => continue,
        };
        if !(1880..=max_year).contains(&year) {
            continue;
        }
        if !stem[..m.start()].chars().any(|c| c.is_alphabetic()) {
            continue;
        }
        return Some((year, &stem[..m.start()]));
    }
    None
}

/// Normalize separators to spaces, strip release vocabulary into `tags`,
/// collapse whitespace, and trim.
fn clean_title(source: &str, tags: &mut Vec<String>) -> String {
    let normalized: String = source
        .chars()
        .map(|c| match c {
            '.' | '_' | '-' | '(' | ')' | '[' | ']' => ' ',
            other => other,
        })
        .collect();

    let mut kept: Vec<&str> = Vec::new();
    for token in normalized.split_whitespace() {
        if RELEASE_TOKENS.contains(&token.to_lowercase().as_str()) {
            tags.push(token.to_string());
        } else {
            kept.push(token);
        }
    }
    kept.join(" ")
}

/// Guard against an empty cleaned title: fall back to the raw stem with
/// separators normalized, so `title_guess` is never empty for non-empty input.
fn fallback_title(cleaned: String, stem: &str) -> String {
    if !cleaned.is_empty() {
        return cleaned;
    }
    let raw: String = stem
        .chars()
        .map(|c| match c {
            '.' | '_' | '-' => ' ',
            other => other,
        })
        .collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
