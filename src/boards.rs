//! # Board Registry
//!
//! Loads the board descriptor table (`boards.yaml`, one row per buildable
//! target) and filters it down to the set of boards a run should build.
//!
//! ## Selection semantics
//!
//! - Each include term is matched against a board's target name, arch, SoC,
//!   vendor and free-form labels; a board matching ANY include term is a
//!   candidate. No include terms means every board is a candidate.
//! - An explicit `--boards` list restricts candidates to exactly those
//!   targets. It narrows the filtered set, it never adds boards.
//! - Exclude terms are always subtracted last, regardless of how a board
//!   was brought in.
//! - A term that matches nothing produces a warning, not a failure; only an
//!   empty final selection is an error.
//!
//! The registry can also regenerate the descriptor table from a board
//! source tree (`ensure_board_list`), scanning `*_defconfig` files with a
//! bounded rayon pool. The per-file extraction is deliberately small; the
//! real scanner is an external tool.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// One buildable hardware target. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Board {
    /// Target name, unique within the table.
    pub target: String,
    pub arch: String,
    pub soc: String,
    pub vendor: String,
    /// Free-form labels used for filtering, e.g. "qemu" or "spl".
    #[serde(default)]
    pub labels: BTreeSet<String>,
}

impl Board {
    /// Whether `term` matches this board's name or any of its attributes.
    pub fn matches(&self, term: &str) -> bool {
        self.target == term
            || self.arch == term
            || self.soc == term
            || self.vendor == term
            || self.labels.contains(term)
    }
}

/// The boards chosen for one run, with the rationale for each filter term.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Selected boards keyed by target name.
    pub boards: BTreeMap<String, Board>,
    /// filter term -> targets it matched. The `"all"` key holds the final
    /// selected set.
    pub rationale: BTreeMap<String, Vec<String>>,
    /// Non-fatal selection problems, e.g. a term matching no boards.
    pub warnings: Vec<String>,
}

impl Selection {
    pub fn len(&self) -> usize {
        self.boards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    /// Distinct architectures across the selected boards.
    pub fn archs(&self) -> BTreeSet<String> {
        self.boards.values().map(|b| b.arch.clone()).collect()
    }
}

/// The full table of buildable targets.
#[derive(Debug, Clone, Default)]
pub struct Boards {
    boards: BTreeMap<String, Board>,
}

impl Boards {
    pub fn new(rows: Vec<Board>) -> Self {
        let boards = rows.into_iter().map(|b| (b.target.clone(), b)).collect();
        Self { boards }
    }

    /// Load the descriptor table from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::BoardTable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let rows: Vec<Board> = serde_yaml::from_str(&text)?;
        debug!("loaded {} boards from {}", rows.len(), path.display());
        Ok(Self::new(rows))
    }

    /// Write the descriptor table to a YAML file.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let rows: Vec<&Board> = self.boards.values().collect();
        fs::write(path, serde_yaml::to_string(&rows)?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.boards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    pub fn get(&self, target: &str) -> Option<&Board> {
        self.boards.get(target)
    }

    /// Filter the table down to a selection.
    ///
    /// See the module docs for the exact include/explicit/exclude ordering.
    pub fn select(
        &self,
        include_terms: &[String],
        exclude_terms: &[String],
        explicit_targets: Option<&[String]>,
    ) -> Result<Selection> {
        let mut selection = Selection::default();
        let mut candidates: BTreeMap<String, Board> = BTreeMap::new();

        if include_terms.is_empty() {
            candidates = self.boards.clone();
        } else {
            for term in include_terms {
                let matched: Vec<String> = self
                    .boards
                    .values()
                    .filter(|b| b.matches(term))
                    .map(|b| b.target.clone())
                    .collect();
                if matched.is_empty() {
                    selection
                        .warnings
                        .push(format!("Argument '{term}' matched no boards"));
                }
                for target in &matched {
                    candidates.insert(target.clone(), self.boards[target].clone());
                }
                selection.rationale.insert(term.clone(), matched);
            }
        }

        // Explicit targets narrow the candidate set, they never widen it.
        if let Some(targets) = explicit_targets {
            let requested: BTreeSet<&str> = targets.iter().map(String::as_str).collect();
            for name in &requested {
                if !self.boards.contains_key(*name) {
                    selection
                        .warnings
                        .push(format!("Board '{name}' not found in board table"));
                }
            }
            candidates.retain(|target, _| requested.contains(target.as_str()));
        }

        // Excludes are subtracted last, no matter what brought a board in.
        for term in exclude_terms {
            candidates.retain(|_, board| !board.matches(term));
        }

        if candidates.is_empty() {
            return Err(Error::Selection {
                message: "selection filters matched no buildable boards".to_string(),
            });
        }

        selection
            .rationale
            .insert("all".to_string(), candidates.keys().cloned().collect());
        selection.boards = candidates;
        Ok(selection)
    }
}

/// Regenerate the board table from the board source tree if needed.
///
/// Scans `src_root` for `*_defconfig` files with a pool of `threads` rayon
/// workers and writes the table to `table_path`. Returns true if the table
/// was (re)generated, false if an existing table was kept.
pub fn ensure_board_list(
    table_path: &Path,
    src_root: &Path,
    threads: usize,
    force: bool,
) -> Result<bool> {
    if table_path.exists() && !force {
        return Ok(false);
    }

    let defconfigs: Vec<_> = WalkDir::new(src_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.file_name()
                    .to_str()
                    .is_some_and(|n| n.ends_with("_defconfig"))
        })
        .map(|e| e.into_path())
        .collect();

    if defconfigs.is_empty() {
        return Err(Error::BoardTable {
            path: table_path.display().to_string(),
            message: format!("no defconfig files found under {}", src_root.display()),
        });
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .map_err(|e| Error::BoardTable {
            path: table_path.display().to_string(),
            message: e.to_string(),
        })?;

    let rows: Vec<Board> = pool.install(|| {
        defconfigs
            .par_iter()
            .filter_map(|path| board_from_defconfig(path))
            .collect()
    });

    info!(
        "regenerated board table: {} boards from {} defconfigs",
        rows.len(),
        defconfigs.len()
    );
    let table = Boards::new(rows);
    table.to_file(table_path)?;
    Ok(true)
}

/// Extract one board row from a defconfig file.
///
/// Reads the `CONFIG_SYS_{ARCH,SOC,VENDOR,CPU}` assignments; boards without
/// an architecture are skipped.
fn board_from_defconfig(path: &Path) -> Option<Board> {
    let name = path.file_name()?.to_str()?;
    let target = name.strip_suffix("_defconfig")?.to_string();
    let text = fs::read_to_string(path).ok()?;

    let mut arch = String::new();
    let mut soc = String::new();
    let mut vendor = String::new();
    let mut labels = BTreeSet::new();
    for line in text.lines() {
        if let Some(value) = config_value(line, "CONFIG_SYS_ARCH") {
            arch = value;
        } else if let Some(value) = config_value(line, "CONFIG_SYS_SOC") {
            soc = value;
        } else if let Some(value) = config_value(line, "CONFIG_SYS_VENDOR") {
            vendor = value;
        } else if let Some(value) = config_value(line, "CONFIG_SYS_CPU") {
            labels.insert(value);
        }
    }
    if arch.is_empty() {
        return None;
    }
    for attr in [&soc, &vendor] {
        if !attr.is_empty() {
            labels.insert(attr.clone());
        }
    }
    Some(Board {
        target,
        arch,
        soc,
        vendor,
        labels,
    })
}

fn config_value(line: &str, key: &str) -> Option<String> {
    let rest = line.strip_prefix(key)?.strip_prefix('=')?;
    Some(rest.trim().trim_matches('"').to_string())
}
