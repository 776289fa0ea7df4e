//! Normalization of search payloads into flat output rows.
//!
//! Flattens the `data[]` posts and `includes.users[]` expansion of a
//! recent-search response into one [`PostRecord`] per post, optionally
//! pseudonymizing the author fields, and produces the one-line summary
//! printed after a fetch.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use xf_common::QueryKey;
use xf_redact::AnonymizeEngine;

/// One normalized output row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub post_id: String,
    pub created_at: Option<String>,
    pub text: String,
    pub lang: Option<String>,
    pub author_id: Option<String>,
    pub username: Option<String>,
    pub author_followers: Option<u64>,
    pub retweets: Option<u64>,
    pub replies: Option<u64>,
    pub likes: Option<u64>,
    pub quotes: Option<u64>,
    pub conversation_id: Option<String>,
    pub query_key: String,
    pub fetched_at: String,
    pub source_platform: String,
}

fn opt_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn opt_metric(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(Value::as_u64)
}

/// Flatten a search response into output rows.
///
/// With an anonymizer, `author_id` becomes a keyed pseudonym and the
/// username is dropped entirely.
pub fn normalize_search_response(
    response: &Value,
    query_key: &QueryKey,
    anonymizer: Option<&AnonymizeEngine>,
) -> Vec<PostRecord> {
    let posts = response
        .get("data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let users: HashMap<&str, &Value> = response
        .get("includes")
        .and_then(|i| i.get("users"))
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|u| u.get("id").and_then(Value::as_str).map(|id| (id, u)))
                .collect()
        })
        .unwrap_or_default();

    let fetched_at = Utc::now().to_rfc3339();
    let empty = Value::Null;

    posts
        .iter()
        .map(|post| {
            let author_id = opt_str(post, "author_id");
            let user = author_id
                .as_deref()
                .and_then(|id| users.get(id).copied())
                .unwrap_or(&empty);
            let post_metrics = post.get("public_metrics").unwrap_or(&empty);
            let user_metrics = user.get("public_metrics").unwrap_or(&empty);

            let (author_id, username) = match anonymizer {
                Some(engine) => (
                    author_id
                        .as_deref()
                        .map(|id| engine.pseudonym(id)),
                    None,
                ),
                None => (author_id.clone(), opt_str(user, "username")),
            };

            PostRecord {
                post_id: opt_str(post, "id").unwrap_or_default(),
                created_at: opt_str(post, "created_at"),
                text: opt_str(post, "text").unwrap_or_default(),
                lang: opt_str(post, "lang"),
                author_id,
                username,
                author_followers: opt_metric(user_metrics, "followers_count"),
                retweets: opt_metric(post_metrics, "retweet_count"),
                replies: opt_metric(post_metrics, "reply_count"),
                likes: opt_metric(post_metrics, "like_count"),
                quotes: opt_metric(post_metrics, "quote_count"),
                conversation_id: opt_str(post, "conversation_id"),
                query_key: query_key.as_str().to_string(),
                fetched_at: fetched_at.clone(),
                source_platform: "x".to_string(),
            }
        })
        .collect()
}

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("valid URL regex"));
static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[@#]\S+").expect("valid mention regex"));
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-zÀ-ÿ一-龥ぁ-ゔァ-ヴー0-9']+").expect("valid token regex"));

/// Lowercased word tokens with URLs and @/# mentions stripped.
fn tokenize(text: &str) -> Vec<String> {
    let text = URL_RE.replace_all(text, " ");
    let text = MENTION_RE.replace_all(&text, " ");
    let lowered = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// The `k` most common adjacent word pairs across `texts`.
pub fn top_bigrams(texts: &[&str], k: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<(String, String), usize> = HashMap::new();
    for text in texts {
        let tokens = tokenize(text);
        for pair in tokens.windows(2) {
            *counts
                .entry((pair[0].clone(), pair[1].clone()))
                .or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<((String, String), usize)> = counts.into_iter().collect();
    // Count descending, then lexicographic for a stable order
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(k)
        .map(|((a, b), n)| (format!("{} {}", a, b), n))
        .collect()
}

fn mean(values: impl Iterator<Item = u64>) -> (f64, usize) {
    let mut sum = 0u64;
    let mut n = 0usize;
    for v in values {
        // Metrics come straight from the payload; don't trust them to fit
        sum = sum.saturating_add(v);
        n += 1;
    }
    if n == 0 {
        (0.0, 0)
    } else {
        (sum as f64 / n as f64, n)
    }
}

/// One-line digest of a batch of rows: count, language distribution,
/// average engagement, top bigrams.
pub fn quick_summary(rows: &[PostRecord]) -> String {
    if rows.is_empty() {
        return "No records.".to_string();
    }

    let mut lang_counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *lang_counts.entry(row.lang.as_deref().unwrap_or("?")).or_insert(0) += 1;
    }
    let mut langs: Vec<(&str, usize)> = lang_counts.into_iter().collect();
    langs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let lang_display = langs
        .iter()
        .map(|(lang, n)| format!("{}:{}", lang, n))
        .collect::<Vec<_>>()
        .join(",");

    let (avg_likes, _) = mean(rows.iter().filter_map(|r| r.likes));
    let (avg_retweets, _) = mean(rows.iter().filter_map(|r| r.retweets));

    let texts: Vec<&str> = rows.iter().map(|r| r.text.as_str()).collect();
    let bigrams = top_bigrams(&texts, 5)
        .into_iter()
        .map(|(bg, n)| format!("'{}'x{}", bg, n))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "records={} | lang={{{}}} | avg_likes={:.2} | avg_retweets={:.2} | top_bigrams=[{}]",
        rows.len(),
        lang_display,
        avg_likes,
        avg_retweets,
        bigrams
    )
}
