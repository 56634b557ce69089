//! Memory mapping utilities for process address space analysis
//!
//! Parses `/proc/<pid>/maps` so that sampled addresses can be attributed to
//! the binary they belong to, and relocated from runtime addresses to the
//! addresses recorded in that binary's symbol tables (PIE / ASLR).

use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

use super::procfs::pid_dir;
use crate::domain::Pid;

/// Address range of a mapping in a process's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// One line of `/proc/<pid>/maps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub range: MemoryRange,
    pub executable: bool,
    pub offset: u64,
    /// Backing file, `None` for anonymous and pseudo mappings (`[stack]`, ...)
    pub path: Option<String>,
}

/// All mappings of a process at one point in time
#[derive(Debug, Clone, Default)]
pub struct MemoryMap {
    mappings: Vec<Mapping>,
}

impl MemoryMap {
    /// Read and parse `/proc/<pid>/maps`
    ///
    /// # Errors
    /// Returns an error if the maps file cannot be read
    pub fn read(proc_root: &Path, pid: Pid) -> Result<Self> {
        let maps_path = pid_dir(proc_root, pid).join("maps");
        let content = fs::read_to_string(&maps_path)
            .with_context(|| format!("Failed to read {}", maps_path.display()))?;
        let map = Self::parse(&content);
        debug!("{pid}: {} mappings, {} executable", map.mappings.len(), map.executable_count());
        Ok(map)
    }

    /// Parse the content of a maps file, skipping malformed lines
    #[must_use]
    pub fn parse(content: &str) -> Self {
        Self { mappings: content.lines().filter_map(parse_maps_line).collect() }
    }

    /// The executable, file-backed mapping containing `addr`
    #[must_use]
    pub fn executable_mapping(&self, addr: u64) -> Option<&Mapping> {
        self.mappings
            .iter()
            .find(|m| m.executable && m.path.is_some() && m.range.contains(addr))
    }

    /// True if `addr` points into executable code
    #[must_use]
    pub fn is_executable(&self, addr: u64) -> bool {
        self.mappings.iter().any(|m| m.executable && m.range.contains(addr))
    }

    /// Lowest start address of all mappings of `path`: where the binary
    /// was loaded.
    #[must_use]
    pub fn load_base(&self, path: &str) -> Option<u64> {
        self.mappings
            .iter()
            .filter(|m| m.path.as_deref() == Some(path))
            .map(|m| m.range.start)
            .min()
    }

    fn executable_count(&self) -> usize {
        self.mappings.iter().filter(|m| m.executable).count()
    }
}

/// Parse the line: "start-end perms offset dev inode pathname"
fn parse_maps_line(line: &str) -> Option<Mapping> {
    let mut parts = line.split_whitespace();
    let (start, end) = parts.next()?.split_once('-')?;
    let perms = parts.next()?;
    let offset = parts.next()?;
    let _dev = parts.next()?;
    let _inode = parts.next()?;
    let path: Vec<&str> = parts.collect();

    let path = if path.is_empty() {
        None
    } else {
        let joined = path.join(" ");
        joined.starts_with('/').then_some(joined)
    };

    Some(Mapping {
        range: MemoryRange {
            start: u64::from_str_radix(start, 16).ok()?,
            end: u64::from_str_radix(end, 16).ok()?,
        },
        executable: perms.contains('x'),
        offset: u64::from_str_radix(offset, 16).ok()?,
        path,
    })
}
