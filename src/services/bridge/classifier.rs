//! Keyword-based request classification.
//!
//! A fixed keyword table maps request text to capability tags. This is an
//! intentionally simple, replaceable heuristic; swapping in a smarter
//! classifier behind [`classify`] changes nothing else.

use crate::domain::models::WorkerCategory;

/// Tag keyword table, matched against whole words of the request.
const TAG_KEYWORDS: &[(WorkerCategory, &[&str])] = &[
    (
        WorkerCategory::Filesystem,
        &[
            "file", "files", "directory", "directories", "folder", "folders", "path", "disk",
        ],
    ),
    (
        WorkerCategory::VersionControl,
        &[
            "commit", "commits", "branch", "branches", "merge", "repository", "repo", "git",
            "diff",
        ],
    ),
    (
        WorkerCategory::Data,
        &["database", "query", "sql", "table", "tables", "record", "records", "rows"],
    ),
    (
        WorkerCategory::Web,
        &["http", "https", "url", "website", "web", "fetch", "download", "page"],
    ),
    (
        WorkerCategory::Messaging,
        &["message", "messages", "channel", "notify", "email", "slack"],
    ),
];

/// Action keywords matched against both the request and operation names.
const ACTION_KEYWORDS: &[&str] = &[
    "read", "write", "list", "search", "create", "delete", "get", "update",
];

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Classify request text into zero or more capability tags.
///
/// Tags come out in table order; a request matching several keyword sets
/// carries all of their tags.
pub fn classify(text: &str) -> Vec<WorkerCategory> {
    let words = words(text);
    TAG_KEYWORDS
        .iter()
        .filter(|(_, keywords)| words.iter().any(|w| keywords.contains(&w.as_str())))
        .map(|(tag, _)| *tag)
        .collect()
}

/// Action keywords present in the request text.
pub fn actions_in(text: &str) -> Vec<&'static str> {
    let words = words(text);
    ACTION_KEYWORDS
        .iter()
        .filter(|action| words.iter().any(|w| w == *action))
        .copied()
        .collect()
}

/// Keywords that define a tag, for matching against capability text.
pub fn tag_keywords(tag: WorkerCategory) -> &'static [&'static str] {
    TAG_KEYWORDS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, keywords)| *keywords)
        .unwrap_or(&[])
}
