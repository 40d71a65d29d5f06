//! Collision-free names for copied components
//!
//! Copies get a label suffix (`" Copy"`) and an API-name suffix (`"_Copy"`),
//! then an incrementing counter while the candidate is still taken. Everything
//! here is pure; callers record the chosen names in their [`ExistingNames`].

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CopierError, CopierResult};

/// Salesforce limit for DeveloperName on reports, dashboards and folders
pub const MAX_API_NAME_LEN: usize = 80;

/// Truncation to fit a length limit never cuts the original below this many characters
pub const MIN_BASE_LEN: usize = 8;

/// Room kept for a collision counter (`_999`) when checking a policy
pub const COUNTER_RESERVE: usize = 4;

static DEVELOPER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*(_[A-Za-z0-9]+)*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePolicy {
    pub label_suffix: String,
    pub api_suffix: String,
    pub max_api_len: usize,
}

impl Default for RenamePolicy {
    fn default() -> Self {
        Self {
            label_suffix: " Copy".to_string(),
            api_suffix: "_Copy".to_string(),
            max_api_len: MAX_API_NAME_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewName {
    pub label: String,
    pub api_name: String,
}

/// API names already taken in a target folder. DeveloperNames are unique
/// case-insensitively, so lookups ignore ASCII case.
#[derive(Debug, Clone, Default)]
pub struct ExistingNames {
    names: HashSet<String>,
}

impl ExistingNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str) -> bool {
        self.names.insert(name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExistingNames {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut names = ExistingNames::new();
        for name in iter {
            names.insert(name.as_ref());
        }
        names
    }
}

impl RenamePolicy {
    /// Reject suffixes and limits that would yield names Salesforce refuses
    pub fn check(&self) -> CopierResult<()> {
        let suffix = &self.api_suffix;
        let well_formed = suffix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && suffix.chars().any(|c| c.is_ascii_alphanumeric())
            && !suffix.contains("__")
            && !suffix.ends_with('_');
        if !well_formed {
            return Err(CopierError::Config(format!(
                "API suffix {:?} must be letters, digits and single underscores, and must not end with '_'",
                suffix
            )));
        }

        let min_len = MIN_BASE_LEN + suffix.len() + COUNTER_RESERVE;
        if self.max_api_len < min_len || self.max_api_len > MAX_API_NAME_LEN {
            return Err(CopierError::Config(format!(
                "maximum API name length must be between {} and {} for suffix {:?}",
                min_len, MAX_API_NAME_LEN, suffix
            )));
        }
        Ok(())
    }

    /// Name for a copy of `(label, api_name)` that is not in `existing` and
    /// differs from the original. Fails when no candidate fits the length
    /// limit without cutting the base below [`MIN_BASE_LEN`].
    pub fn derive_name(
        &self,
        label: &str,
        api_name: &str,
        existing: &ExistingNames,
        label_max_len: usize,
    ) -> CopierResult<NewName> {
        let base = if is_valid_developer_name(api_name) {
            api_name.to_string()
        } else {
            to_developer_name(if api_name.trim().is_empty() { label } else { api_name })
        };
        let label_base = match (label.trim().is_empty(), api_name.trim().is_empty()) {
            (false, _) => label,
            (true, false) => api_name,
            (true, true) => base.as_str(),
        };

        let mut counter = 1;
        loop {
            let api_tail = self.api_tail(counter);
            let candidate = fit_api_name(&base, &api_tail, self.max_api_len)
                .ok_or_else(|| self.no_room(api_name))?;
            if !candidate.eq_ignore_ascii_case(api_name) && !existing.contains(&candidate) {
                let label_tail = self.label_tail(counter);
                return Ok(NewName {
                    label: fit_label(label_base, &label_tail, label_max_len),
                    api_name: candidate,
                });
            }
            counter += 1;
        }
    }

    /// `base` itself when free, otherwise the first free suffixed form.
    /// Used for brand-new folders, which do not need to differ from anything.
    pub fn dedupe_developer_name(
        &self,
        base: &str,
        existing: &ExistingNames,
    ) -> CopierResult<String> {
        if !existing.contains(base) {
            return Ok(base.to_string());
        }
        let mut counter = 1;
        loop {
            let candidate = fit_api_name(base, &self.api_tail(counter), self.max_api_len)
                .ok_or_else(|| self.no_room(base))?;
            if !existing.contains(&candidate) {
                return Ok(candidate);
            }
            counter += 1;
        }
    }

    fn no_room(&self, api_name: &str) -> CopierError {
        CopierError::unsupported(
            api_name,
            format!(
                "no free API name fits within {} characters",
                self.max_api_len
            ),
        )
    }

    fn api_tail(&self, counter: u32) -> String {
        if counter == 1 {
            self.api_suffix.clone()
        } else {
            format!("{}_{}", self.api_suffix, counter)
        }
    }

    fn label_tail(&self, counter: u32) -> String {
        if counter == 1 {
            self.label_suffix.clone()
        } else {
            format!("{} {}", self.label_suffix, counter)
        }
    }
}

/// Whether `name` is usable as a DeveloperName as-is
pub fn is_valid_developer_name(name: &str) -> bool {
    name.len() <= MAX_API_NAME_LEN && DEVELOPER_NAME_RE.is_match(name)
}

/// Normalize a free-text label into a DeveloperName
pub fn to_developer_name(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for ch in label.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    let mut out = out.trim_end_matches('_').to_string();

    if out.is_empty() {
        out = "Copy".to_string();
    } else if !out.starts_with(|c: char| c.is_ascii_alphabetic()) {
        out.insert(0, 'X');
    }

    if out.len() > MAX_API_NAME_LEN {
        out.truncate(MAX_API_NAME_LEN);
        out = out.trim_end_matches('_').to_string();
    }
    out
}

/// `base + tail` within `max_len`, trimming only the tail end of `base`.
/// `None` when that would cut `base` below [`MIN_BASE_LEN`].
fn fit_api_name(base: &str, tail: &str, max_len: usize) -> Option<String> {
    let room = max_len.checked_sub(tail.len())?;
    if base.len() <= room {
        return Some(format!("{}{}", base, tail));
    }
    if room < MIN_BASE_LEN {
        return None;
    }
    // API names are ASCII, so byte slicing is char-safe here
    let mut trimmed = &base[..room];
    // A dangling separator is not part of the kept base
    while trimmed.len() > 1 && trimmed.ends_with('_') {
        trimmed = &trimmed[..trimmed.len() - 1];
    }
    Some(format!("{}{}", trimmed, tail))
}

fn fit_label(base: &str, tail: &str, max_len: usize) -> String {
    let tail_chars = tail.chars().count();
    let room = max_len.saturating_sub(tail_chars);
    let base_chars = base.chars().count();
    if base_chars <= room {
        return format!("{}{}", base, tail);
    }
    let keep = room.max(MIN_BASE_LEN.min(base_chars));
    let trimmed: String = base.chars().take(keep).collect();
    format!("{}{}", trimmed.trim_end(), tail)
}
