//! xfetch - free-plan post fetcher with durable usage guards
//!
//! Pulls recent posts from the platform's v2 API while staying inside the
//! free plan: a 100-posts-per-month quota and one counts/search call per
//! 15 minutes, both enforced through a persistent ledger. Raw payloads land
//! as JSONL, normalized rows as CSV.

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::io::IsTerminal;
use std::path::PathBuf;
use xf_common::{format_error_human, Error, OutputFormat, QueryKey, StructuredError};
use xf_core::client::{
    clamp_max_results, Granularity, HttpPostsClient, PostsClient, SamplePostsClient,
};
use xf_core::config::{self, Limits, QueryBook};
use xf_core::exit_codes::ExitCode;
use xf_core::ledger::{EndpointClass, LedgerStore, ResetScope, UsageLedger};
use xf_core::logging::{generate_run_id, init_logging, LogLevel};
use xf_core::normalize::{normalize_search_response, quick_summary};
use xf_core::output::{save_jsonl, write_clean_csv, DataDirs};
use xf_redact::AnonymizeEngine;

/// xfetch - pull posts from the free-plan API without blowing the quota
#[derive(Parser)]
#[command(name = "xfetch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Override config directory (queries.yaml, limits.toml)
    #[arg(long, global = true, env = "XFETCH_CONFIG_DIR")]
    config: Option<PathBuf>,

    /// Override data directory (ledger, raw/, clean/)
    #[arg(long, global = true, env = "XFETCH_DATA")]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "md")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Use the deterministic offline backend instead of the live API
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show ledger state and remaining budget
    Status,

    /// Post volume estimate for a query (counts endpoint, zero quota)
    Scout(ScoutArgs),

    /// Fetch recent posts for a query and write JSONL + CSV
    Fetch(FetchArgs),

    /// Clear ledger fields
    Reset(ResetArgs),
}

#[derive(Args, Debug)]
struct ScoutArgs {
    /// Query key from queries.yaml
    #[arg(long)]
    query_key: QueryKey,

    /// Counts bucket size
    #[arg(long, default_value = "hour")]
    granularity: Granularity,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Query key from queries.yaml
    #[arg(long)]
    query_key: QueryKey,

    /// Posts to request (clamped to the API window 10-100)
    #[arg(long, default_value = "10")]
    max_results: u32,

    /// Pseudonymize author IDs and drop usernames in the CSV
    #[arg(long)]
    anonymize: bool,
}

#[derive(Args, Debug)]
struct ResetArgs {
    /// Which ledger fields to clear
    #[arg(long, default_value = "monthly")]
    what: ResetScope,
}

fn main() {
    let cli = Cli::parse();

    init_logging(LogLevel::from_flags(cli.global.verbose, cli.global.quiet));
    let run_id = generate_run_id();
    tracing::debug!(%run_id, "starting");

    let exit_code = match &cli.command {
        Commands::Status => run_status(&cli.global),
        Commands::Scout(args) => run_scout(&cli.global, args),
        Commands::Fetch(args) => run_fetch(&cli.global, args),
        Commands::Reset(args) => run_reset(&cli.global, args),
    };

    std::process::exit(exit_code.as_i32());
}

/// Open the ledger store: limits from the config dir, ledger in the data dir.
fn open_store(global: &GlobalOpts) -> Result<(LedgerStore, DataDirs), Error> {
    let config_dir = config::resolve_config_dir(global.config.as_deref())?;
    let limits = Limits::load(&config_dir)?;
    let dirs = DataDirs::resolve(global.data_dir.as_deref())?;
    dirs.ensure()?;
    let store = LedgerStore::open(&dirs.root, limits)?;
    Ok((store, dirs))
}

fn build_client(global: &GlobalOpts) -> Result<Box<dyn PostsClient>, Error> {
    if global.offline {
        tracing::info!("using offline backend");
        Ok(Box::new(SamplePostsClient::new()))
    } else {
        Ok(Box::new(HttpPostsClient::from_env()?))
    }
}

fn report_error(global: &GlobalOpts, err: &Error) -> ExitCode {
    match global.format {
        OutputFormat::Exitcode => {}
        OutputFormat::Json => {
            eprintln!("{}", StructuredError::from(err).to_json_pretty());
        }
        _ => {
            let use_color = !global.no_color && std::io::stderr().is_terminal();
            eprintln!("{}", format_error_human(err, use_color));
        }
    }
    ExitCode::from(err)
}

// ============================================================================
// status
// ============================================================================

fn run_status(global: &GlobalOpts) -> ExitCode {
    let result = (|| -> Result<(UsageLedger, Limits), Error> {
        let (store, _dirs) = open_store(global)?;
        let ledger = store.status()?;
        Ok((ledger, store.limits().clone()))
    })();

    let (ledger, limits) = match result {
        Ok(pair) => pair,
        Err(err) => return report_error(global, &err),
    };

    let remaining = limits.monthly_cap.saturating_sub(ledger.monthly_post_count);
    let ready_in_secs = ledger.last_rate_limited_call_at.map(|last| {
        let elapsed = (Utc::now() - last).num_seconds().max(0) as u64;
        limits.cooldown_secs.saturating_sub(elapsed)
    });

    match global.format {
        OutputFormat::Exitcode => {}
        OutputFormat::Json => {
            let payload = json!({
                "month": ledger.month,
                "monthly_post_count": ledger.monthly_post_count,
                "monthly_cap": limits.monthly_cap,
                "remaining": remaining,
                "last_rate_limited_call_at": ledger.last_rate_limited_call_at,
                "ready_in_secs": ready_in_secs,
            });
            println!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());
        }
        OutputFormat::Summary => {
            println!(
                "month={} used={}/{} remaining={} ready_in={}s",
                ledger.month,
                ledger.monthly_post_count,
                limits.monthly_cap,
                remaining,
                ready_in_secs.unwrap_or(0)
            );
        }
        OutputFormat::Md => {
            println!("# xfetch status\n");
            println!("- Month: {}", ledger.month);
            println!(
                "- Quota: {}/{} used ({} remaining)",
                ledger.monthly_post_count, limits.monthly_cap, remaining
            );
            match ledger.last_rate_limited_call_at {
                Some(last) => {
                    println!("- Last API call: {}", last.to_rfc3339());
                    match ready_in_secs {
                        Some(0) | None => println!("- Rate window: clear"),
                        Some(secs) => println!("- Rate window: ready in {}s", secs),
                    }
                }
                None => println!("- Last API call: never"),
            }
        }
    }

    ExitCode::Clean
}

// ============================================================================
// scout
// ============================================================================

fn run_scout(global: &GlobalOpts, args: &ScoutArgs) -> ExitCode {
    match scout_inner(global, args) {
        Ok(code) => code,
        Err(err) => report_error(global, &err),
    }
}

fn scout_inner(global: &GlobalOpts, args: &ScoutArgs) -> Result<ExitCode, Error> {
    let config_dir = config::resolve_config_dir(global.config.as_deref())?;
    let book = QueryBook::load(&config_dir)?;
    let query = book.resolve(&args.query_key)?;
    let client = build_client(global)?;

    let (store, dirs) = open_store(global)?;

    // Counts consumes no post quota but shares the 15-minute cadence
    store.check_and_reserve(0, EndpointClass::CountsOrSearch)?;

    let now = Utc::now();
    let response = client.counts_recent(&query, args.granularity)?;

    let raw_path = dirs.counts_jsonl_path(&args.query_key, now);
    save_jsonl(&raw_path, &[&response])?;

    let total = response
        .pointer("/meta/total_tweet_count")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| {
            response
                .pointer("/data")
                .and_then(Value::as_array)
                .map(|buckets| {
                    buckets
                        .iter()
                        .filter_map(|b| b.get("tweet_count").and_then(Value::as_u64))
                        .sum()
                })
                .unwrap_or(0)
        });
    let buckets = response
        .pointer("/data")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);

    tracing::info!(total, buckets, "scout complete");

    match global.format {
        OutputFormat::Exitcode => {}
        OutputFormat::Json => {
            let payload = json!({
                "query_key": args.query_key.as_str(),
                "granularity": args.granularity.as_str(),
                "total_posts": total,
                "buckets": buckets,
                "raw_path": raw_path,
            });
            println!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());
        }
        OutputFormat::Summary => {
            println!(
                "scout {} total={} buckets={} raw={}",
                args.query_key,
                total,
                buckets,
                raw_path.display()
            );
        }
        OutputFormat::Md => {
            println!("# scout: {}\n", args.query_key);
            println!(
                "- Volume: {} posts over {} {} buckets",
                total, buckets, args.granularity
            );
            println!("- Raw counts: {}", raw_path.display());
        }
    }

    Ok(ExitCode::Clean)
}

// ============================================================================
// fetch
// ============================================================================

fn run_fetch(global: &GlobalOpts, args: &FetchArgs) -> ExitCode {
    match fetch_inner(global, args) {
        Ok(code) => code,
        Err(err) => report_error(global, &err),
    }
}

fn fetch_inner(global: &GlobalOpts, args: &FetchArgs) -> Result<ExitCode, Error> {
    // Resolve everything that can fail cheaply before touching the ledger,
    // so a typo'd key or missing token never consumes quota
    let config_dir = config::resolve_config_dir(global.config.as_deref())?;
    let book = QueryBook::load(&config_dir)?;
    let query = book.resolve(&args.query_key)?;
    let client = build_client(global)?;

    let (store, dirs) = open_store(global)?;
    let requested = clamp_max_results(args.max_results);

    store.check_and_reserve(requested, EndpointClass::CountsOrSearch)?;

    let now = Utc::now();
    let response = match client.search_recent(&query, requested) {
        Ok(response) => response,
        Err(err) => {
            // The call failed before any posts were delivered. Give the
            // whole reservation back; the rate timestamp stays because the
            // endpoint was hit.
            if let Err(release_err) = store.release(requested) {
                tracing::warn!(%release_err, "failed to release reserved quota");
            }
            return Err(err);
        }
    };

    let raw_path = dirs.fetch_jsonl_path(&args.query_key, now);
    save_jsonl(&raw_path, &[&response])?;

    let anonymizer = args
        .anonymize
        .then(|| AnonymizeEngine::from_salt(&config::project_salt()));
    let rows = normalize_search_response(&response, &args.query_key, anonymizer.as_ref());

    // The API may deliver fewer posts than reserved
    let delivered = rows.len() as u32;
    let ledger = if delivered < requested {
        store.release(requested - delivered)?
    } else {
        store.status()?
    };

    let csv_path = dirs.fetch_csv_path(&args.query_key, now);
    write_clean_csv(&csv_path, &rows)?;

    let summary = quick_summary(&rows);
    tracing::info!(
        delivered,
        requested,
        monthly_post_count = ledger.monthly_post_count,
        "fetch complete"
    );

    match global.format {
        OutputFormat::Exitcode => {}
        OutputFormat::Json => {
            let payload = json!({
                "query_key": args.query_key.as_str(),
                "requested": requested,
                "delivered": delivered,
                "anonymized": args.anonymize,
                "raw_path": raw_path,
                "csv_path": csv_path,
                "monthly_post_count": ledger.monthly_post_count,
                "monthly_cap": store.limits().monthly_cap,
                "summary": summary,
            });
            println!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());
        }
        OutputFormat::Summary => {
            println!("fetch {} delivered={} {}", args.query_key, delivered, summary);
        }
        OutputFormat::Md => {
            println!("# fetch: {}\n", args.query_key);
            println!("- Delivered: {} of {} requested", delivered, requested);
            if args.anonymize {
                println!("- Authors pseudonymized");
            }
            println!("- Raw posts: {}", raw_path.display());
            println!("- Clean CSV: {}", csv_path.display());
            println!(
                "- Quota: {}/{} used",
                ledger.monthly_post_count,
                store.limits().monthly_cap
            );
            println!("\n{}", summary);
        }
    }

    Ok(ExitCode::Clean)
}

// ============================================================================
// reset
// ============================================================================

fn run_reset(global: &GlobalOpts, args: &ResetArgs) -> ExitCode {
    let result = (|| -> Result<UsageLedger, Error> {
        let (store, _dirs) = open_store(global)?;
        store.reset(args.what)
    })();

    let ledger = match result {
        Ok(ledger) => ledger,
        Err(err) => return report_error(global, &err),
    };

    match global.format {
        OutputFormat::Exitcode => {}
        OutputFormat::Json => {
            let payload = json!({
                "reset": args.what.to_string(),
                "month": ledger.month,
                "monthly_post_count": ledger.monthly_post_count,
                "last_rate_limited_call_at": ledger.last_rate_limited_call_at,
            });
            println!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());
        }
        OutputFormat::Summary => {
            println!(
                "reset {} used={} last_call={}",
                args.what,
                ledger.monthly_post_count,
                ledger
                    .last_rate_limited_call_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string())
            );
        }
        OutputFormat::Md => {
            println!("# reset: {}\n", args.what);
            println!("- Monthly count: {}", ledger.monthly_post_count);
            match ledger.last_rate_limited_call_at {
                Some(last) => println!("- Last API call: {}", last.to_rfc3339()),
                None => println!("- Last API call: never"),
            }
        }
    }

    ExitCode::Clean
}
