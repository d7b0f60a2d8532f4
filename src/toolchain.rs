//! # Toolchain Registry
//!
//! Maps architecture names to cross-compiler prefixes. Detection scans
//! `PATH` for the usual `<tuple>-gcc` candidates per architecture; a global
//! `--toolchain` override replaces the detected prefix for every
//! architecture. The sandbox architecture always builds with the native
//! compiler (empty prefix).

use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use log::debug;

use crate::boards::Selection;
use crate::error::{Error, Result};

/// Candidate prefixes tried in order for each known architecture.
const CANDIDATES: &[(&str, &[&str])] = &[
    ("arm", &["arm-linux-gnueabihf-", "arm-linux-gnueabi-", "arm-none-eabi-"]),
    ("aarch64", &["aarch64-linux-gnu-", "aarch64-none-elf-"]),
    ("x86", &["x86_64-linux-gnu-", "i686-linux-gnu-"]),
    ("riscv", &["riscv64-linux-gnu-", "riscv32-unknown-elf-"]),
    ("powerpc", &["powerpc-linux-gnu-"]),
    ("mips", &["mips-linux-gnu-"]),
    ("m68k", &["m68k-linux-gnu-"]),
    ("sh", &["sh4-linux-gnu-"]),
    ("xtensa", &["xtensa-linux-gnu-"]),
];

/// One architecture's cross-compiler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub arch: String,
    /// Cross-compiler prefix, empty for the native compiler.
    pub cross_compile: String,
}

impl Toolchain {
    /// Environment-variable projection for a native build invocation.
    pub fn env(&self) -> Vec<(String, String)> {
        vec![("CROSS_COMPILE".to_string(), self.cross_compile.clone())]
    }
}

/// All known toolchains, keyed by architecture.
#[derive(Debug, Clone, Default)]
pub struct Toolchains {
    by_arch: BTreeMap<String, Toolchain>,
    override_prefix: Option<String>,
}

impl Toolchains {
    pub fn new(toolchains: Vec<Toolchain>) -> Self {
        let by_arch = toolchains
            .into_iter()
            .map(|t| (t.arch.clone(), t))
            .collect();
        Self {
            by_arch,
            override_prefix: None,
        }
    }

    /// Scan `PATH` for cross compilers for every known architecture.
    pub fn detect() -> Self {
        let path = env::var_os("PATH").unwrap_or_default();
        let dirs: Vec<_> = env::split_paths(&path).collect();
        let mut found = Vec::new();
        for (arch, prefixes) in CANDIDATES {
            if let Some(prefix) = prefixes.iter().find(|p| gcc_on_path(&dirs, p)) {
                debug!("toolchain for {arch}: {prefix}gcc");
                found.push(Toolchain {
                    arch: arch.to_string(),
                    cross_compile: prefix.to_string(),
                });
            }
        }
        Self::new(found)
    }

    /// Replace the prefix for every architecture with `prefix`.
    pub fn with_override(mut self, prefix: Option<String>) -> Self {
        self.override_prefix = prefix;
        self
    }

    /// Resolve the toolchain for one architecture, deterministic per arch.
    pub fn resolve(&self, arch: &str) -> Result<Toolchain> {
        if let Some(prefix) = &self.override_prefix {
            return Ok(Toolchain {
                arch: arch.to_string(),
                cross_compile: prefix.clone(),
            });
        }
        // Sandbox builds are host-native
        if arch == "sandbox" {
            return Ok(Toolchain {
                arch: arch.to_string(),
                cross_compile: String::new(),
            });
        }
        self.by_arch
            .get(arch)
            .cloned()
            .ok_or_else(|| Error::ToolchainMissing {
                arch: arch.to_string(),
            })
    }

    /// The single prefix shared by every board in `selection`.
    ///
    /// Fails when the boards span more than one distinct toolchain.
    pub fn single_prefix(&self, selection: &Selection) -> Result<String> {
        let mut prefixes = std::collections::BTreeSet::new();
        for arch in selection.archs() {
            prefixes.insert(self.resolve(&arch)?.cross_compile);
        }
        if prefixes.len() != 1 {
            return Err(Error::AmbiguousToolchain {
                count: prefixes.len(),
                prefixes: prefixes.iter().cloned().collect::<Vec<_>>().join(", "),
            });
        }
        Ok(prefixes.into_iter().next().unwrap_or_default())
    }

    /// Architectures with a known toolchain, for listing.
    pub fn list(&self) -> Vec<&Toolchain> {
        self.by_arch.values().collect()
    }
}

fn gcc_on_path(dirs: &[std::path::PathBuf], prefix: &str) -> bool {
    let name = format!("{prefix}gcc");
    dirs.iter().any(|dir| gcc_in_dir(dir, &name))
}

fn gcc_in_dir(dir: &Path, name: &str) -> bool {
    dir.join(name).is_file()
}
