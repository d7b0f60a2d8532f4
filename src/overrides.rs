//! # Config Adjuster
//!
//! Computes the configuration-key override set applied uniformly to every
//! job. Raw tokens arrive from the CLI: `KEY=value` sets a value, `KEY`
//! enables an option and a trailing `-` (`KEY-`) disables it.
//!
//! Reproducible-build mode adds a `LOCALVERSION_AUTO` disable unless the
//! user already pinned a version key, so that builds of different commits
//! differ only by actual source changes and not by the embedded git hash.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};

/// What to do with one configuration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CfgAction {
    Set(String),
    Enable,
    Disable,
}

/// key -> action, produced once per run.
pub type OverrideSet = BTreeMap<String, CfgAction>;

/// Parse raw override tokens into an override set.
pub fn parse_tokens(raw: &[String]) -> Result<OverrideSet> {
    let mut set = OverrideSet::new();
    for token in raw {
        let (key, action) = if let Some((key, value)) = token.split_once('=') {
            (key, CfgAction::Set(value.to_string()))
        } else if let Some(key) = token.strip_suffix('-') {
            (key, CfgAction::Disable)
        } else {
            (token.as_str(), CfgAction::Enable)
        };
        if key.is_empty() {
            return Err(Error::Overrides {
                token: token.clone(),
                message: "missing configuration key".to_string(),
            });
        }
        set.insert(normalize_key(key), action);
    }
    Ok(set)
}

/// Compute the final override set for a run.
pub fn compute(raw: &[String], reproducible: bool) -> Result<OverrideSet> {
    let mut set = parse_tokens(raw)?;
    if reproducible {
        if set.contains_key("LOCALVERSION") || set.contains_key("LOCALVERSION_AUTO") {
            debug!("not dropping LOCALVERSION_AUTO: version key already overridden");
        } else {
            set.insert("LOCALVERSION_AUTO".to_string(), CfgAction::Disable);
        }
    }
    Ok(set)
}

/// Keys may be given with or without the `CONFIG_` prefix.
fn normalize_key(key: &str) -> String {
    key.strip_prefix("CONFIG_").unwrap_or(key).to_string()
}

/// Apply the override set to a generated `.config` file in place.
///
/// Runs after the configure step: matching assignment lines are replaced,
/// missing keys are appended, disabled keys become "is not set" comments.
pub fn apply_to_config(set: &OverrideSet, config_path: &Path) -> Result<()> {
    if set.is_empty() {
        return Ok(());
    }
    let text = fs::read_to_string(config_path)?;
    let mut seen: BTreeMap<&str, bool> = set.keys().map(|k| (k.as_str(), false)).collect();
    let mut lines = Vec::new();

    for line in text.lines() {
        match override_for_line(set, line) {
            Some((key, rendered)) => {
                seen.insert(key, true);
                lines.push(rendered);
            }
            None => lines.push(line.to_string()),
        }
    }
    for (key, action) in set {
        if !seen[key.as_str()] {
            lines.push(render(key, action));
        }
    }
    fs::write(config_path, lines.join("\n") + "\n")?;
    Ok(())
}

/// If `line` configures a key in `set`, return the replacement line.
fn override_for_line<'a>(set: &'a OverrideSet, line: &str) -> Option<(&'a str, String)> {
    for (key, action) in set {
        let assign = format!("CONFIG_{key}=");
        let unset = format!("# CONFIG_{key} is not set");
        if line.starts_with(&assign) || line.trim() == unset {
            return Some((key.as_str(), render(key, action)));
        }
    }
    None
}

fn render(key: &str, action: &CfgAction) -> String {
    match action {
        CfgAction::Set(value) => format!("CONFIG_{key}={value}"),
        CfgAction::Enable => format!("CONFIG_{key}=y"),
        CfgAction::Disable => format!("# CONFIG_{key} is not set"),
    }
}
