//! xfetch core library.
//!
//! Implements the pieces behind the `xfetch` binary:
//! - Usage ledger with durable quota and rate-cadence guards
//! - Query book and guard limit configuration
//! - Free-plan API client (HTTP and deterministic offline backends)
//! - Payload normalization and anonymization
//! - Raw JSONL / clean CSV file output

pub mod client;
pub mod config;
pub mod exit_codes;
pub mod ledger;
pub mod logging;
pub mod normalize;
pub mod output;
