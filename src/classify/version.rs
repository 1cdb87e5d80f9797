//! Ordered version values
//!
//! Accepts strict semver strings (via the `semver` crate) as well as the
//! looser PEP 440 forms PyPI publishes (`1.0`, `2.0rc1`, `1.4.0.dev0`,
//! `3.2.post1`). Build metadata and post-release suffixes never take part in
//! ordering.

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

/// Release segments followed by anything else
static RELEASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)*)(.*)$").unwrap());

/// One pre/post/dev segment of a PEP 440 suffix
static SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[-_.]?(alpha|a|beta|b|preview|pre|rc|c|dev|post|rev|r)[-_.]?(\d*)").unwrap()
});

/// Implicit post-release, `1.0-1`
static IMPLICIT_POST_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-(\d+)$").unwrap());

/// A semver identifier that fuses a PEP 440 label with its number, `rc2`
static FUSED_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(alpha|a|beta|b|rc|c|dev|pre|preview)(\d+)$").unwrap()
});

/// A single pre-release identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreIdent {
    Numeric(u64),
    Label(String),
}

impl PreIdent {
    /// Appends one dot-separated semver identifier, splitting `rc2` into
    /// `rc` and `2` so it orders like `rc.2`
    fn push_semver(ident: &str, out: &mut Vec<PreIdent>) {
        if let Ok(n) = ident.parse::<u64>() {
            if ident.chars().all(|c| c.is_ascii_digit()) {
                out.push(PreIdent::Numeric(n));
                return;
            }
        }
        if let Some(caps) = FUSED_LABEL_RE.captures(ident) {
            if let Ok(n) = caps[2].parse::<u64>() {
                out.push(PreIdent::Label(normalize_label(&caps[1])));
                out.push(PreIdent::Numeric(n));
                return;
            }
        }
        out.push(PreIdent::Label(normalize_label(ident)));
    }

    /// `dev` sorts before every other label; the rest compare lexically
    fn label_rank(label: &str) -> u8 {
        if label == "dev" {
            0
        } else {
            1
        }
    }
}

impl Ord for PreIdent {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PreIdent::Numeric(a), PreIdent::Numeric(b)) => a.cmp(b),
            (PreIdent::Numeric(_), PreIdent::Label(_)) => Ordering::Less,
            (PreIdent::Label(_), PreIdent::Numeric(_)) => Ordering::Greater,
            (PreIdent::Label(a), PreIdent::Label(b)) => (Self::label_rank(a), a.as_str())
                .cmp(&(Self::label_rank(b), b.as_str())),
        }
    }
}

impl PartialOrd for PreIdent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PreIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreIdent::Numeric(n) => write!(f, "{}", n),
            PreIdent::Label(l) => write!(f, "{}", l),
        }
    }
}

/// Maps PEP 440 spellings onto one canonical label
fn normalize_label(label: &str) -> String {
    let lower = label.to_ascii_lowercase();
    match lower.as_str() {
        "a" | "alpha" => "alpha".to_string(),
        "b" | "beta" => "beta".to_string(),
        "c" | "rc" | "pre" | "preview" => "rc".to_string(),
        _ => lower,
    }
}

fn is_post_label(label: &str) -> bool {
    matches!(label.to_ascii_lowercase().as_str(), "post" | "rev" | "r")
}

/// A parsed version: release tuple plus optional pre-release
#[derive(Debug, Clone)]
pub struct Version {
    release: Vec<u64>,
    pre: Vec<PreIdent>,
}

impl Version {
    /// Parses a version string, returning `None` when it is not a version
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let s = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        if s.is_empty() {
            return None;
        }

        if let Ok(v) = semver::Version::parse(s) {
            let mut pre = Vec::new();
            let suffix = v.pre.as_str();
            // a lone number, `1.0.0-1`, is an implicit post-release
            if !suffix.bytes().all(|b| b.is_ascii_digit()) {
                for ident in suffix.split('.') {
                    PreIdent::push_semver(ident, &mut pre);
                }
            }
            return Some(Self {
                release: vec![v.major, v.minor, v.patch],
                pre,
            });
        }

        Self::parse_lenient(s)
    }

    fn parse_lenient(s: &str) -> Option<Self> {
        let without_build = s.split('+').next().unwrap_or(s);
        let caps = RELEASE_RE.captures(without_build)?;
        let mut release = caps[1]
            .split('.')
            .map(|p| p.parse::<u64>().ok())
            .collect::<Option<Vec<u64>>>()?;
        while release.len() < 3 {
            release.push(0);
        }

        let mut rest = caps.get(2).map_or("", |m| m.as_str());
        let mut pre = Vec::new();
        if IMPLICIT_POST_RE.is_match(rest) {
            rest = "";
        }
        while !rest.is_empty() {
            let caps = SUFFIX_RE.captures(rest)?;
            let label = &caps[1];
            let number = caps.get(2).map_or("", |m| m.as_str());
            if !is_post_label(label) {
                pre.push(PreIdent::Label(normalize_label(label)));
                pre.push(PreIdent::Numeric(number.parse().unwrap_or(0)));
            }
            rest = &rest[caps[0].len()..];
        }

        Some(Self { release, pre })
    }

    /// First release segment
    pub fn major(&self) -> u64 {
        self.release.first().copied().unwrap_or(0)
    }

    /// Returns true if the version carries a pre-release suffix
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    fn significant_release(&self) -> &[u64] {
        let end = self
            .release
            .iter()
            .rposition(|&n| n != 0)
            .map_or(0, |i| i + 1);
        &self.release[..end]
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.significant_release()
            .cmp(other.significant_release())
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release: Vec<String> = self.release.iter().map(u64::to_string).collect();
        write!(f, "{}", release.join("."))?;
        if !self.pre.is_empty() {
            let pre: Vec<String> = self.pre.iter().map(PreIdent::to_string).collect();
            write!(f, "-{}", pre.join("."))?;
        }
        Ok(())
    }
}
