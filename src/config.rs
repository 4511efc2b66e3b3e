//! # Binder Configuration
//!
//! Per-binder decoding settings. Every [`Binder`](crate::Binder) owns its own
//! copy; there is no process-wide configuration.
//!
//! ## Environment Variables
//!
//! ### `FORMBIND_MAX_BODY_BYTES`
//!
//! Largest body the decoder accepts, in bytes. Accepts decimal (`1048576`) or
//! hexadecimal (`0x100000`). Unset or unparsable means no limit.
//!
//! ### `FORMBIND_EMPTY_BODY_AS_EMPTY`
//!
//! `true` (default) decodes an empty or whitespace-only body as the empty
//! document, so records whose body fields are all defaulted still decode.
//! `false` hands the empty body to the parser, which rejects it.
//!
//! ### `FORMBIND_DEFAULT_BODY_FORMAT`
//!
//! `json` (default) or `form`. Used when a request carries no recognized
//! `Content-Type`.
//!
//! ## File Configuration
//!
//! ```yaml
//! max_body_bytes: 65536
//! empty_body_as_empty_document: true
//! default_body_format: json
//! ```

use crate::bundle::BodyFormat;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinderConfig {
    /// Reject bodies larger than this many bytes (default: unlimited)
    pub max_body_bytes: Option<usize>,
    /// Decode a blank body as `{}` / an empty form (default: true)
    pub empty_body_as_empty_document: bool,
    /// Format used when the request has no recognized content type
    pub default_body_format: BodyFormat,
}

impl Default for BinderConfig {
    fn default() -> Self {
        BinderConfig {
            max_body_bytes: None,
            empty_body_as_empty_document: true,
            default_body_format: BodyFormat::Json,
        }
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl BinderConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for unset or invalid values.
    pub fn from_env() -> Self {
        let defaults = BinderConfig::default();
        BinderConfig {
            max_body_bytes: env::var("FORMBIND_MAX_BODY_BYTES")
                .ok()
                .and_then(|v| parse_size(&v)),
            empty_body_as_empty_document: env::var("FORMBIND_EMPTY_BODY_AS_EMPTY")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.empty_body_as_empty_document),
            default_body_format: env::var("FORMBIND_DEFAULT_BODY_FORMAT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_body_format),
        }
    }

    /// Parse a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse binder config")
    }

    /// Load a YAML configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read binder config: {}", path.display()))?;
        Self::from_yaml_str(&contents)
            .with_context(|| format!("Invalid binder config: {}", path.display()))
    }
}
