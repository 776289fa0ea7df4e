//! Usage ledger: durable quota and rate-cadence guards.
//!
//! The ledger tracks monthly post consumption and the timestamp of the last
//! call to the rate-limited endpoint class, persisted as `ledger.json` in the
//! data directory. Every guarded operation runs as a single atomic
//! read-check-write step under an exclusive advisory lock on a sibling lock
//! file, so overlapping process invocations serialize instead of jointly
//! exceeding the free-plan caps.
//!
//! Crash semantics: the updated ledger is persisted before a reservation is
//! reported as successful, so a crash after success is never lost and a
//! crash before success never double-counts.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use xf_common::{Error, Result, SCHEMA_VERSION};

use crate::config::Limits;

const LEDGER_FILE: &str = "ledger.json";
const LOCK_FILE: &str = "ledger.lock";

/// Which guard applies to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    /// Counts and recent-search endpoints: one call per 15 minutes.
    CountsOrSearch,
    /// Endpoints with no rate cadence of their own.
    Other,
}

/// Scope selector for `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResetScope {
    /// Clear the monthly post counter.
    Monthly,
    /// Clear the rate-cadence timestamp.
    RateTimer,
    /// Clear everything back to a fresh ledger.
    All,
}

impl std::fmt::Display for ResetScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetScope::Monthly => write!(f, "monthly"),
            ResetScope::RateTimer => write!(f, "rate-timer"),
            ResetScope::All => write!(f, "all"),
        }
    }
}

/// Persisted ledger state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLedger {
    pub schema_version: String,

    /// Calendar month (`YYYY-MM`) the counter belongs to.
    pub month: String,

    /// Posts consumed this month. Never exceeds the configured cap.
    pub monthly_post_count: u32,

    /// Timestamp of the last counts/recent-search call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_rate_limited_call_at: Option<DateTime<Utc>>,
}

impl UsageLedger {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            month: month_tag(now),
            monthly_post_count: 0,
            last_rate_limited_call_at: None,
        }
    }
}

/// `YYYY-MM` tag for a timestamp.
pub fn month_tag(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m").to_string()
}

/// Durable store for the usage ledger.
///
/// Every public operation acquires the ledger lock for its full duration,
/// so check-and-reserve is atomic across concurrent invocations.
pub struct LedgerStore {
    dir: PathBuf,
    limits: Limits,
}

impl LedgerStore {
    /// Open (creating the directory if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, limits: Limits) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, limits })
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.join(LEDGER_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Current ledger state, with calendar rollover applied.
    pub fn status(&self) -> Result<UsageLedger> {
        let _lock = LedgerLock::acquire(&self.lock_path())?;
        self.load_current(Utc::now())
    }

    /// Atomically check both guards and reserve `requested` posts.
    ///
    /// Fails with [`Error::TimeGuard`] if `class` is rate limited and the
    /// last such call was under the cooldown window ago; fails with
    /// [`Error::QuotaGuard`] if the reservation would push the monthly count
    /// past the cap. On success the updated ledger has been persisted before
    /// this returns. A failed check leaves the ledger untouched.
    ///
    /// Counts-only calls pass `requested = 0`: they hit the rate gate but
    /// consume no post quota.
    pub fn check_and_reserve(&self, requested: u32, class: EndpointClass) -> Result<UsageLedger> {
        let _lock = LedgerLock::acquire(&self.lock_path())?;
        // Taken after the lock: a wait for a contended lock must not make
        // the stamped timestamp or the guard comparison stale
        let now = Utc::now();
        let mut ledger = self.load_current(now)?;

        if class == EndpointClass::CountsOrSearch {
            if let Some(last) = ledger.last_rate_limited_call_at {
                let elapsed = (now - last).num_seconds();
                if elapsed < self.limits.cooldown_secs as i64 {
                    return Err(Error::TimeGuard {
                        elapsed_secs: elapsed,
                        required_secs: self.limits.cooldown_secs,
                    });
                }
            }
        }

        if ledger.monthly_post_count.saturating_add(requested) > self.limits.monthly_cap {
            return Err(Error::QuotaGuard {
                used: ledger.monthly_post_count,
                requested,
                cap: self.limits.monthly_cap,
            });
        }

        ledger.monthly_post_count += requested;
        if class == EndpointClass::CountsOrSearch {
            ledger.last_rate_limited_call_at = Some(now);
        }
        self.persist(&ledger)?;

        tracing::debug!(
            requested,
            monthly_post_count = ledger.monthly_post_count,
            "reserved quota"
        );
        Ok(ledger)
    }

    /// Return `unused` reserved posts to the quota.
    ///
    /// Used when the API delivered fewer posts than were reserved, or none
    /// at all. The rate timestamp is left as-is: the endpoint was hit.
    pub fn release(&self, unused: u32) -> Result<UsageLedger> {
        let _lock = LedgerLock::acquire(&self.lock_path())?;
        let mut ledger = self.load_current(Utc::now())?;
        ledger.monthly_post_count = ledger.monthly_post_count.saturating_sub(unused);
        self.persist(&ledger)?;

        tracing::debug!(
            unused,
            monthly_post_count = ledger.monthly_post_count,
            "released unused quota"
        );
        Ok(ledger)
    }

    /// Clear the selected ledger fields.
    ///
    /// `ResetScope::All` never reads the existing file, so it also recovers
    /// from a corrupted ledger.
    pub fn reset(&self, scope: ResetScope) -> Result<UsageLedger> {
        let _lock = LedgerLock::acquire(&self.lock_path())?;
        let now = Utc::now();

        let ledger = match scope {
            ResetScope::Monthly => {
                let mut ledger = self.load_current(now)?;
                ledger.monthly_post_count = 0;
                ledger
            }
            ResetScope::RateTimer => {
                let mut ledger = self.load_current(now)?;
                ledger.last_rate_limited_call_at = None;
                ledger
            }
            ResetScope::All => UsageLedger::fresh(now),
        };

        self.persist(&ledger)?;
        Ok(ledger)
    }

    /// Load the ledger, creating a fresh one on first run and applying the
    /// calendar-month rollover when configured. Must be called with the
    /// ledger lock held.
    fn load_current(&self, now: DateTime<Utc>) -> Result<UsageLedger> {
        let path = self.ledger_path();

        let mut ledger = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str::<UsageLedger>(&content).map_err(|e| {
                Error::LedgerCorrupted {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?
        } else {
            let fresh = UsageLedger::fresh(now);
            self.persist(&fresh)?;
            fresh
        };

        let current = month_tag(now);
        if ledger.month != current && self.limits.auto_month_reset {
            tracing::info!(
                old_month = %ledger.month,
                new_month = %current,
                "calendar month rolled over; monthly counter reset"
            );
            ledger.month = current;
            ledger.monthly_post_count = 0;
            self.persist(&ledger)?;
        }

        Ok(ledger)
    }

    /// Write the ledger via a temp file and rename, so readers only ever
    /// observe a complete document and a crash mid-write leaves the previous
    /// ledger intact.
    fn persist(&self, ledger: &UsageLedger) -> Result<()> {
        let path = self.ledger_path();
        let content = serde_json::to_string_pretty(ledger)?;
        let tmp_path = path.with_file_name(format!(
            "{}.tmp.{}",
            LEDGER_FILE,
            std::process::id()
        ));
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

/// Scoped exclusive lock on the ledger.
///
/// Blocks until the lock is available: concurrent invocations serialize
/// rather than fail, so the loser of a race observes the winner's
/// reservation and gets a guard error instead of a lock error.
struct LedgerLock {
    file: File,
}

impl LedgerLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false) // Keep lock file contents (advisory lock only)
            .open(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let fd = file.as_raw_fd();
            // LOCK_EX = Exclusive lock, blocking until available
            let result = unsafe { libc::flock(fd, libc::LOCK_EX) };
            if result != 0 {
                return Err(Error::Io(std::io::Error::last_os_error()));
            }
        }

        // On non-unix we just hold the file handle (basic locking)

        // Record the holder's PID
        file.set_len(0)?;
        let mut writer = &file;
        let _ = writer.write_all(format!("{}", std::process::id()).as_bytes());
        let _ = writer.flush();

        Ok(Self { file })
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // Best effort unlock
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        // Do NOT remove the lock file. Removing it introduces a race where a
        // waiting process holds a lock on a deleted inode while a newcomer
        // locks a fresh file with the same name. Letting the empty lock file
        // persist is safe and standard practice.
    }
}
