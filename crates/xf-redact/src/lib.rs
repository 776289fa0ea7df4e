//! Anonymization engine for xfetch.
//!
//! Provides keyed, non-reversible pseudonyms for author identifiers so that
//! normalized output rows can be shared without exposing account identities,
//! while keeping pseudonyms stable across fetches for longitudinal analysis.
//!
//! # Example
//!
//! ```
//! use xf_redact::AnonymizeEngine;
//!
//! let engine = AnonymizeEngine::from_salt("project-salt");
//! let a = engine.pseudonym("1001");
//! let b = engine.pseudonym("1001");
//! assert_eq!(a, b);
//! assert!(!a.contains("1001"));
//! ```

pub mod engine;
pub mod error;
pub mod hash;

pub use engine::AnonymizeEngine;
pub use error::{RedactionError, Result};
pub use hash::KeyMaterial;
