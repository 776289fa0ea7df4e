//! Deterministic offline backend.
//!
//! Mimics the shape of the v2 counts and recent-search payloads so the CLI
//! can be exercised end to end without credentials or network access. All
//! values are derived from the current time and the request parameters, so
//! repeated calls are stable enough for tests to assert on structure and
//! counts.

use super::{Granularity, PostsClient};
use chrono::{DateTime, Duration, Timelike, Utc};
use serde_json::{json, Value};
use xf_common::Result;

struct SampleUser {
    id: &'static str,
    username: &'static str,
    name: &'static str,
    followers: u64,
    posts: u64,
}

const SAMPLE_USERS: [SampleUser; 4] = [
    SampleUser {
        id: "1001",
        username: "ringside_fan",
        name: "Ringside Fan",
        followers: 1540,
        posts: 3200,
    },
    SampleUser {
        id: "1002",
        username: "cage_addict",
        name: "Cage Addict",
        followers: 2890,
        posts: 5400,
    },
    SampleUser {
        id: "1003",
        username: "combat_journal",
        name: "Combat Journal",
        followers: 870,
        posts: 1220,
    },
    SampleUser {
        id: "1004",
        username: "fight_polyglot",
        name: "Fight Polyglot",
        followers: 640,
        posts: 980,
    },
];

const SAMPLE_LANGS: [&str; 5] = ["en", "es", "pt", "fr", "ja"];

fn user_json(user: &SampleUser) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "name": user.name,
        "public_metrics": {
            "followers_count": user.followers,
            "tweet_count": user.posts,
        },
    })
}

/// Offline stand-in for the platform API.
pub struct SamplePostsClient;

impl SamplePostsClient {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SamplePostsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PostsClient for SamplePostsClient {
    fn counts_recent(&self, query: &str, granularity: Granularity) -> Result<Value> {
        let (steps, step) = match granularity {
            Granularity::Hour => (24u32, Duration::hours(1)),
            Granularity::Day => (7u32, Duration::hours(24)),
        };
        let anchor: DateTime<Utc> = Utc::now()
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or_else(Utc::now);

        let mut data = Vec::with_capacity(steps as usize);
        let mut total: u64 = 0;
        for i in 0..steps {
            let start = anchor - step * (steps - i) as i32;
            let end = start + step;
            let post_count = 12 + ((i as u64 * 3) % 9);
            total += post_count;
            data.push(json!({
                "start": start.to_rfc3339(),
                "end": end.to_rfc3339(),
                "tweet_count": post_count,
            }));
        }

        Ok(json!({
            "data": data,
            "meta": {
                "query": query,
                "granularity": granularity.as_str(),
                "total_tweet_count": total,
            },
        }))
    }

    fn search_recent(&self, query: &str, max_results: u32) -> Result<Value> {
        let n = max_results.clamp(1, 100) as usize;
        let now = Utc::now();
        let query_excerpt: String = query.chars().take(60).collect();

        let mut posts = Vec::with_capacity(n);
        let mut included: Vec<&str> = Vec::new();

        for idx in 0..n {
            let user = &SAMPLE_USERS[idx % SAMPLE_USERS.len()];
            if !included.contains(&user.id) {
                included.push(user.id);
            }
            let post_id = (now.timestamp() - idx as i64).to_string();
            let created = now - Duration::minutes(idx as i64 * 3);
            posts.push(json!({
                "id": post_id,
                "author_id": user.id,
                "created_at": created.to_rfc3339(),
                "lang": SAMPLE_LANGS[idx % SAMPLE_LANGS.len()],
                "text": format!(
                    "[{}] Sample post referencing query {} (offline backend).",
                    idx + 1,
                    query_excerpt
                ),
                "public_metrics": {
                    "retweet_count": (idx * 2) % 7,
                    "reply_count": (idx * 3) % 5,
                    "like_count": 5 + (idx * 4) % 20,
                    "quote_count": idx % 3,
                },
                "conversation_id": post_id,
            }));
        }

        let users: Vec<Value> = SAMPLE_USERS
            .iter()
            .filter(|u| included.contains(&u.id))
            .map(user_json)
            .collect();

        let newest = posts.first().and_then(|p| p.get("id")).cloned();
        let oldest = posts.last().and_then(|p| p.get("id")).cloned();

        Ok(json!({
            "data": posts,
            "includes": { "users": users },
            "meta": {
                "result_count": n,
                "newest_id": newest,
                "oldest_id": oldest,
                "query": query,
            },
        }))
    }
}
