//! Reference extraction and path handling for the unused-file audit.
//!
//! Everything here is lenient: a reference that cannot be understood is
//! dropped, which keeps its target out of the referenced set but never turns
//! an unrelated file into a deletion candidate.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use html5ever::driver::ParseOpts;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use percent_encoding::percent_decode_str;
use regex::Regex;
use scraper::{Html, HtmlTreeSink};
use url::Url;

/// Prefixes that always denote something other than a local file.
const EXTERNAL_PREFIXES: [&str; 6] = ["http://", "https://", "mailto:", "tel:", "javascript:", "data:"];

static CSS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)url\(\s*(?:"(.*?)"|'(.*?)'|(.*?))\s*\)"#).expect("regex"));

/// Collects the value of every attribute named in `attrs` on every element.
///
/// html5ever recovers from any markup, so a malformed document still yields
/// whatever references it could see. `<noscript>` and `<template>` content
/// counts like any other markup.
pub fn extract_html_refs(text: &str, attrs: &[String]) -> Vec<String> {
    let document = parse_without_scripting(text);
    let mut refs = Vec::new();
    for node in document.tree.nodes() {
        let Some(element) = node.value().as_element() else {
            continue;
        };
        for (name, value) in element.attrs() {
            if !value.is_empty() && attrs.iter().any(|a| a == name) {
                refs.push(value.to_string());
            }
        }
    }
    refs
}

/// Parses as a browser with scripting off would, so `<noscript>` children
/// become elements instead of one raw text node.
fn parse_without_scripting(text: &str) -> Html {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            scripting_enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    html5ever::parse_document(HtmlTreeSink::new(Html::new_document()), opts).one(text)
}

/// Collects the tokens of every `url(...)`, quoted or bare.
pub fn extract_css_refs(text: &str) -> Vec<String> {
    CSS_URL
        .captures_iter(text)
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)).or_else(|| cap.get(3)))
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn is_external(raw: &str) -> bool {
    let v = raw.trim();
    if v.is_empty() || v.starts_with('#') {
        return true;
    }
    let lowered = v.to_ascii_lowercase();
    EXTERNAL_PREFIXES.iter().any(|p| lowered.starts_with(p))
}

/// Reduces a raw reference to a repo-relative path string.
///
/// Returns `None` for external URLs, fragment-only anchors, empty values and
/// directory references (no index inference).
///
/// Idempotent except when decoding produces `#`, `?` or a new `%XX` escape
/// (`%23`, `%3F`, `%25`): a second pass cuts or decodes again.
pub fn normalize_ref(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if is_external(raw) {
        return None;
    }

    // Network-path references and anything the URL parser accepts as
    // absolute carry a host or scheme.
    if raw.starts_with("//") || Url::parse(raw).is_ok() {
        return None;
    }

    let path = raw.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    if decoded.is_empty() || decoded.ends_with('/') {
        return None;
    }

    let mut rest: &str = &decoded;
    loop {
        if let Some(s) = rest.strip_prefix("./") {
            rest = s;
        } else if let Some(s) = rest.strip_prefix('/') {
            rest = s;
        } else {
            break;
        }
    }

    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

/// Maps a normalized reference to a location inside `repo_root`.
///
/// References starting with one of `root_prefixes` are taken from the
/// repository root, everything else from the directory of `base_file`.
/// `repo_root` must already be canonical. Targets outside it yield `None`.
pub fn resolve_ref(repo_root: &Path, base_file: &Path, normalized: &str, root_prefixes: &[String]) -> Option<PathBuf> {
    let root_relative = normalized.starts_with('/') || root_prefixes.iter().any(|p| normalized.starts_with(p.as_str()));
    let joined = if root_relative {
        repo_root.join(normalized)
    } else {
        base_file.parent().unwrap_or(repo_root).join(normalized)
    };

    let candidate = canonicalize_lenient(&joined);
    candidate.starts_with(repo_root).then_some(candidate)
}

/// Repo-relative, forward-slash form of `path`.
pub fn repo_relative(repo_root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(repo_root).ok()?;
    let rel_s = rel.to_string_lossy().replace('\\', "/");
    if rel_s.is_empty() { Some(".".to_string()) } else { Some(rel_s) }
}

/// Resolves `path` component by component: symlinks are followed as long as
/// the prefix exists, so `link/..` leaves through the link target. Past the
/// first missing component the rest is collapsed lexically, which keeps
/// missing targets reportable.
fn canonicalize_lenient(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut exists = true;
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => {
                out.push(other.as_os_str());
                if exists {
                    match std::fs::canonicalize(&out) {
                        Ok(real) => out = real,
                        Err(_) => exists = false,
                    }
                }
            }
        }
    }
    out
}
