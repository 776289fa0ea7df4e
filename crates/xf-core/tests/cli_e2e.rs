//! End-to-end CLI tests using the offline backend.

use assert_cmd::Command;
use chrono::Utc;
use predicates::prelude::*;
use tempfile::TempDir;

struct TestEnv {
    config: TempDir,
    data: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        let env = Self {
            config: TempDir::new().unwrap(),
            data: TempDir::new().unwrap(),
        };
        std::fs::write(
            env.config.path().join("queries.yaml"),
            "spectacle_en: \"(rizin OR ufc) lang:en -is:retweet\"\n",
        )
        .unwrap();
        env
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("xfetch").unwrap();
        cmd.env_clear()
            .env("XFETCH_CONFIG_DIR", self.config.path())
            .env("XFETCH_DATA", self.data.path());
        cmd
    }

    fn seed_ledger(&self, used: u32, minutes_since_last_call: Option<i64>) {
        let last = minutes_since_last_call
            .map(|m| {
                format!(
                    r#","last_rate_limited_call_at":"{}""#,
                    (Utc::now() - chrono::Duration::minutes(m)).to_rfc3339()
                )
            })
            .unwrap_or_default();
        std::fs::write(
            self.data.path().join("ledger.json"),
            format!(
                r#"{{"schema_version":"1.0.0","month":"{}","monthly_post_count":{}{}}}"#,
                Utc::now().format("%Y-%m"),
                used,
                last
            ),
        )
        .unwrap();
    }

    fn files_in(&self, subdir: &str) -> Vec<String> {
        let dir = self.data.path().join(subdir);
        if !dir.exists() {
            return vec![];
        }
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}

#[test]
fn status_on_fresh_state() {
    let env = TestEnv::new();
    env.cmd()
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0/100 used"));
}

#[test]
fn status_json_is_parseable() {
    let env = TestEnv::new();
    let output = env.cmd().args(["status", "-f", "json"]).output().unwrap();
    assert!(output.status.success());
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["monthly_post_count"], 0);
    assert_eq!(payload["monthly_cap"], 100);
    assert_eq!(payload["remaining"], 100);
}

#[test]
fn offline_fetch_writes_raw_and_clean_files() {
    let env = TestEnv::new();
    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Delivered: 10 of 10"));

    let raw = env.files_in("raw");
    assert_eq!(raw.len(), 1);
    assert!(raw[0].starts_with("fetch_spectacle_en_"));
    assert!(raw[0].ends_with(".jsonl"));

    let clean = env.files_in("clean");
    assert_eq!(clean.len(), 1);
    assert!(clean[0].starts_with("fetch_spectacle_en_"));
    assert!(clean[0].ends_with(".csv"));

    // CSV has a header plus ten rows
    let csv = std::fs::read_to_string(env.data.path().join("clean").join(&clean[0])).unwrap();
    assert_eq!(csv.lines().count(), 11);
    assert!(csv.lines().next().unwrap().starts_with("post_id,created_at,"));

    // The fetch consumed quota
    env.cmd()
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10/100 used"));
}

#[test]
fn fetch_near_cap_exits_3_and_consumes_nothing() {
    let env = TestEnv::new();
    env.seed_ledger(95, None);

    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline", "--max-results", "10"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Monthly Quota Guard"));

    // Nothing written, nothing consumed
    assert!(env.files_in("raw").is_empty());
    env.cmd()
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("95/100 used"));
}

#[test]
fn fetch_within_rate_window_exits_2() {
    let env = TestEnv::new();
    env.seed_ledger(10, Some(5));

    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Rate Cadence Guard"));
    assert!(env.files_in("raw").is_empty());
}

#[test]
fn fetch_after_window_succeeds() {
    let env = TestEnv::new();
    env.seed_ledger(10, Some(16));

    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline"])
        .assert()
        .success();
    assert_eq!(env.files_in("raw").len(), 1);
}

#[test]
fn consecutive_fetches_hit_the_rate_gate() {
    let env = TestEnv::new();
    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline"])
        .assert()
        .success();
    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline"])
        .assert()
        .code(2);
}

#[test]
fn unknown_query_key_exits_4_without_consuming_quota() {
    let env = TestEnv::new();
    env.cmd()
        .args(["fetch", "--query-key", "no_such_key", "--offline"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Unknown Query Key"));

    env.cmd()
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0/100 used"));
}

#[test]
fn missing_token_exits_4_in_live_mode() {
    let env = TestEnv::new();
    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Missing Credentials"));
}

#[test]
fn error_json_format_is_structured() {
    let env = TestEnv::new();
    env.seed_ledger(95, None);

    let output = env
        .cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline", "-f", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    let err: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["category"], "guard");
    assert_eq!(err["context"]["used"], 95);
    assert_eq!(err["recoverable"], true);
}

#[test]
fn exitcode_format_is_silent() {
    let env = TestEnv::new();
    env.seed_ledger(95, None);

    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline", "-f", "exitcode"])
        .assert()
        .code(3)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());
}

#[test]
fn scout_writes_counts_without_consuming_quota() {
    let env = TestEnv::new();
    env.cmd()
        .args(["scout", "--query-key", "spectacle_en", "--offline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("24 hour buckets"));

    let raw = env.files_in("raw");
    assert_eq!(raw.len(), 1);
    assert!(raw[0].starts_with("counts_spectacle_en_"));

    env.cmd()
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0/100 used"));

    // But scout does arm the rate gate
    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline"])
        .assert()
        .code(2);
}

#[test]
fn scout_daily_granularity() {
    let env = TestEnv::new();
    env.cmd()
        .args(["scout", "--query-key", "spectacle_en", "--offline", "--granularity", "day"])
        .assert()
        .success()
        .stdout(predicate::str::contains("7 day buckets"));
}

#[test]
fn reset_monthly_reopens_quota() {
    let env = TestEnv::new();
    env.seed_ledger(100, None);

    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline"])
        .assert()
        .code(3);

    env.cmd()
        .args(["reset", "--what", "monthly"])
        .assert()
        .success();

    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline"])
        .assert()
        .success();
}

#[test]
fn reset_rate_timer_clears_the_window() {
    let env = TestEnv::new();
    env.seed_ledger(10, Some(5));

    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline"])
        .assert()
        .code(2);

    env.cmd()
        .args(["reset", "--what", "rate-timer"])
        .assert()
        .success();

    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline"])
        .assert()
        .success();
}

#[test]
fn anonymized_fetch_omits_usernames() {
    let env = TestEnv::new();
    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline", "--anonymize"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Authors pseudonymized"));

    let clean = env.files_in("clean");
    let csv = std::fs::read_to_string(env.data.path().join("clean").join(&clean[0])).unwrap();
    // The offline backend's usernames must not appear anywhere
    assert!(!csv.contains("ringside_fan"));
    // Pseudonyms are 32-char hex, not the raw numeric author IDs
    assert!(!csv.contains(",1001,"));
}

#[test]
fn max_results_is_clamped_to_api_window() {
    let env = TestEnv::new();
    env.cmd()
        .args(["fetch", "--query-key", "spectacle_en", "--offline", "--max-results", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Delivered: 10 of 10"));
}

#[test]
fn corrupted_ledger_is_reported() {
    let env = TestEnv::new();
    std::fs::write(env.data.path().join("ledger.json"), "{not json").unwrap();

    env.cmd()
        .args(["status"])
        .assert()
        .code(21)
        .stderr(predicate::str::contains("Ledger Corrupted"));

    // reset --what all recovers without manual file surgery
    env.cmd().args(["reset", "--what", "all"]).assert().success();
    env.cmd()
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0/100 used"));
}
