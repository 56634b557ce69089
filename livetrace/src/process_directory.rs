//! Point-in-time process listing with name/PID lookup.

use log::{debug, warn};
use regex::Regex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use livetrace_common::ProcessInfo;

use crate::domain::EnumerationError;
use crate::platform::ProcessSource;

/// Attempts before a persistently transient enumeration is given up
const MAX_ENUMERATION_ATTEMPTS: usize = 16;
const RETRY_DELAY: Duration = Duration::from_millis(1);

/// All processes of the system at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessDirectory {
    /// Nanoseconds since the Unix epoch when the listing was taken
    pub timestamp_ns: u64,
    /// Sorted by PID
    pub processes: Vec<ProcessInfo>,
}

impl ProcessDirectory {
    /// Enumerate all processes, retrying transient failures.
    ///
    /// # Errors
    /// The last [`EnumerationError`] when enumeration cannot succeed.
    pub fn snapshot(source: &dyn ProcessSource) -> Result<Self, EnumerationError> {
        let mut attempt = 1;
        let processes = loop {
            match source.enumerate() {
                Ok(processes) => break processes,
                Err(e) if e.is_transient() && attempt < MAX_ENUMERATION_ATTEMPTS => {
                    debug!("Retrying process enumeration ({e})");
                    attempt += 1;
                    std::thread::sleep(RETRY_DELAY);
                }
                Err(e) => {
                    warn!("{e}");
                    return Err(e);
                }
            }
        };

        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX));
        Ok(Self { timestamp_ns, processes })
    }

    /// First process whose image name matches `pattern`.
    ///
    /// The pattern is a regular expression searched anywhere in the image
    /// name. A pattern that does not compile is matched as literal text.
    #[must_use]
    pub fn find(&self, pattern: &str) -> Option<&ProcessInfo> {
        let pattern = NamePattern::new(pattern);
        self.processes.iter().find(|p| pattern.is_match(&p.image_name))
    }

    /// Resolve a user-supplied rule.
    ///
    /// An all-digit rule is a literal PID; anything else is an image name
    /// pattern. An empty rule matches nothing.
    #[must_use]
    pub fn find_by_rule(&self, rule: &str) -> Option<&ProcessInfo> {
        let rule = rule.trim();
        if rule.is_empty() {
            return None;
        }
        if rule.bytes().all(|b| b.is_ascii_digit()) {
            let pid: u32 = rule.parse().ok()?;
            return self.processes.iter().find(|p| p.id == pid);
        }
        self.find(rule)
    }
}

/// A name rule compiled once per lookup
#[derive(Debug)]
enum NamePattern {
    Regex(Regex),
    Literal(String),
}

impl NamePattern {
    fn new(pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => Self::Regex(regex),
            Err(e) => {
                debug!("Matching '{pattern}' literally: {e}");
                Self::Literal(pattern.to_string())
            }
        }
    }

    fn is_match(&self, image_name: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(image_name),
            Self::Literal(text) => image_name.contains(text.as_str()),
        }
    }
}
