//! Provider response normalization.
//!
//! The provider's result list can sit under several field names. Candidate
//! paths are tried in a fixed order against the parsed body and the first
//! non-empty array wins; every item is then mapped onto [`SearchResult`].
//! Nothing past this boundary sees provider JSON.

use crate::types::SearchResult;
use serde_json::Value;

/// Where the result list may live, in priority order.
const RESULT_PATHS: &[&[&str]] = &[
    &["results", "web"],
    &["results"],
    &["hits"],
    &["data"],
    &["items"],
    &["search_results"],
    &["web_results"],
    &["pages"],
];

/// Raw result items from a provider body, or an empty slice.
pub fn extract_results(body: &Value) -> &[Value] {
    RESULT_PATHS
        .iter()
        .filter_map(|path| value_at(body, path).and_then(Value::as_array))
        .find(|items| !items.is_empty())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Map one raw item onto the canonical shape. Never fails.
pub fn normalize_result(item: &Value) -> SearchResult {
    SearchResult {
        url: first_str(
            item,
            &[
                &["url"],
                &["link"],
                &["sourceUrl"],
                &["source_url"],
                &["page", "url"],
                &["document", "url"],
            ],
        ),
        title: first_str(
            item,
            &[
                &["title"],
                &["name"],
                &["pageTitle"],
                &["page", "title"],
                &["document", "title"],
            ],
        ),
        snippet: snippet_of(item),
        source: first_str(item, &[&["source"], &["site"], &["publisher"]]),
        date: first_str(
            item,
            &[
                &["date"],
                &["published"],
                &["published_date"],
                &["publishedDate"],
                &["timestamp"],
            ],
        ),
        content_markdown_if_any: first_str(
            item,
            &[
                &["content_markdown"],
                &["content_markdown_if_any"],
                &["livecrawl", "content_markdown"],
                &["livecrawl", "content"],
                &["content", "markdown"],
                &["markdown"],
            ],
        ),
    }
}

/// Parse a provider body and normalize its results.
pub fn normalize_body(body: &Value) -> Vec<SearchResult> {
    extract_results(body).iter().map(normalize_result).collect()
}

fn snippet_of(item: &Value) -> String {
    let direct = first_str(
        item,
        &[
            &["snippet"],
            &["description"],
            &["extract"],
            &["text"],
            &["highlight"],
        ],
    );
    if !direct.is_empty() {
        return direct;
    }
    item.get("snippets")
        .and_then(Value::as_array)
        .and_then(|list| list.iter().filter_map(Value::as_str).find(|s| !s.is_empty()))
        .unwrap_or_default()
        .to_string()
}

fn first_str(item: &Value, paths: &[&[&str]]) -> String {
    paths
        .iter()
        .filter_map(|path| lookup(item, path))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn lookup<'a>(item: &'a Value, path: &[&str]) -> Option<&'a str> {
    value_at(item, path)?.as_str()
}

fn value_at<'a>(item: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = item;
    for key in path {
        current = current.get(*key)?;
    }
    Some(current)
}
