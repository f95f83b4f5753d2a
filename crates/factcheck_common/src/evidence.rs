//! Evidence selection.
//!
//! Turns the results gathered for one claim into a short, domain-diverse
//! evidence list. Trusted domains are taken first; untrusted hits only fill
//! remaining slots so a claim never ends up with zero evidence just because
//! every hit came from outside the allowlist.

use crate::config::AllowlistConfig;
use crate::types::{Evidence, SearchResult};
use std::collections::HashSet;

/// Excerpt length cap in characters
pub const EXCERPT_CHARS: usize = 240;

/// Domain trust predicate consulted by the collector
pub trait DomainTrust: Send + Sync {
    fn is_trusted(&self, host: &str) -> bool;

    /// Human-readable policy, handed to the verdict collaborator.
    fn describe(&self) -> String;
}

/// Flat allowlist: trusted TLD suffixes plus curated news domains
/// (exact match or any subdomain).
#[derive(Debug, Clone)]
pub struct Allowlist {
    tlds: Vec<String>,
    news_domains: Vec<String>,
}

impl Allowlist {
    pub fn new(tlds: Vec<String>, news_domains: Vec<String>) -> Self {
        Self {
            tlds: tlds.into_iter().map(|t| t.to_lowercase()).collect(),
            news_domains: news_domains.into_iter().map(|d| d.to_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &AllowlistConfig) -> Self {
        Self::new(config.tlds.clone(), config.news_domains.clone())
    }
}

impl DomainTrust for Allowlist {
    fn is_trusted(&self, host: &str) -> bool {
        if host.is_empty() {
            return false;
        }
        self.tlds.iter().any(|tld| host.ends_with(tld.as_str()))
            || self
                .news_domains
                .iter()
                .any(|domain| domain_matches(host, domain))
    }

    fn describe(&self) -> String {
        format!(
            "Allowed TLDs: {}\nTop news domains: {}",
            self.tlds.join(", "),
            self.news_domains.join(", ")
        )
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

/// Lowercased hostname of a URL, or empty when the URL does not parse.
pub fn domain_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_lowercase))
        .unwrap_or_default()
}

/// Cut to `limit` characters, appending `...` when anything was dropped.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Select up to `max_items` evidence items, at most one per domain.
pub fn collect_evidence(
    results: &[SearchResult],
    trust: &dyn DomainTrust,
    max_items: usize,
) -> Vec<Evidence> {
    let mut evidence = Vec::new();
    let mut seen_domains: HashSet<String> = HashSet::new();
    let mut seen_urls: HashSet<&str> = HashSet::new();
    let mut deferred: Vec<&SearchResult> = Vec::new();

    for item in results {
        if evidence.len() >= max_items {
            break;
        }
        if item.url.is_empty() || seen_urls.contains(item.url.as_str()) {
            continue;
        }
        let host = domain_from_url(&item.url);
        if host.is_empty() || seen_domains.contains(&host) {
            continue;
        }
        if !trust.is_trusted(&host) {
            deferred.push(item);
            continue;
        }
        seen_urls.insert(&item.url);
        evidence.push(to_evidence(item, &host));
        seen_domains.insert(host);
    }

    for item in deferred {
        if evidence.len() >= max_items {
            break;
        }
        if seen_urls.contains(item.url.as_str()) {
            continue;
        }
        let host = domain_from_url(&item.url);
        if seen_domains.contains(&host) {
            continue;
        }
        seen_urls.insert(&item.url);
        evidence.push(to_evidence(item, &host));
        seen_domains.insert(host);
    }

    evidence
}

fn to_evidence(item: &SearchResult, host: &str) -> Evidence {
    Evidence {
        url: item.url.clone(),
        title: if item.title.is_empty() {
            host.to_string()
        } else {
            item.title.clone()
        },
        source_domain: host.to_string(),
        excerpt: truncate_chars(item.body_text(), EXCERPT_CHARS),
    }
}
