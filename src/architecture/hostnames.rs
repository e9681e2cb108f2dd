//! Instance naming
//!
//! Instances are named after numbers spelled out in English ("zero", "one",
//! ..., "twentyone") unless a hostnames file is supplied.

use crate::error::{Error, Result};
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::debug;

const ONES: [&str; 20] = [
    "zero",
    "one",
    "two",
    "three",
    "four",
    "five",
    "six",
    "seven",
    "eight",
    "nine",
    "ten",
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// `n` spelled out as a single lowercase word, e.g. 42 -> "fortytwo"
pub fn number_name(n: usize) -> String {
    match n {
        0..=19 => ONES[n].to_string(),
        20..=99 => {
            let (tens, ones) = (n / 10, n % 10);
            if ones == 0 {
                TENS[tens].to_string()
            } else {
                format!("{}{}", TENS[tens], ONES[ones])
            }
        }
        100..=999 => {
            let (hundreds, rest) = (n / 100, n % 100);
            let mut name = format!("{}hundred", ONES[hundreds]);
            if rest > 0 {
                name.push_str("and");
                name.push_str(&number_name(rest));
            }
            name
        }
        _ => format!("node{}", n),
    }
}

/// A valid hostname label: lowercase letters, digits and inner hyphens
pub fn is_valid_hostname(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

// =============================================================================
// Hostnames
// =============================================================================

/// Names (and optional addresses) for the instances of a new cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hostnames {
    entries: Vec<(String, Option<Ipv4Addr>)>,
}

impl Hostnames {
    /// `n` number-word names starting at "zero"
    pub fn words(n: usize) -> Self {
        Self {
            entries: (0..n).map(|i| (number_name(i), None)).collect(),
        }
    }

    /// The first `n` names listed in `path`
    ///
    /// Each non-empty, non-comment line holds a hostname optionally followed
    /// by an IPv4 address. With `pattern`, only names matching the glob are
    /// considered.
    pub fn from_file(path: &Path, pattern: Option<&str>, n: usize) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Configure(format!("Cannot read hostnames from {}: {}", path.display(), e))
        })?;
        let matcher = pattern
            .map(glob::Pattern::new)
            .transpose()
            .map_err(|e| Error::Configure(format!("Invalid hostnames pattern: {}", e)))?;

        let mut entries = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            let name = fields.next().unwrap_or_default();
            if let Some(m) = &matcher {
                if !m.matches(name) {
                    continue;
                }
            }
            if !is_valid_hostname(name) {
                return Err(Error::Configure(format!(
                    "{}:{}: invalid hostname '{}'",
                    path.display(),
                    lineno + 1,
                    name
                )));
            }
            let ip = match fields.next() {
                Some(addr) => Some(addr.parse::<Ipv4Addr>().map_err(|e| {
                    Error::Configure(format!(
                        "{}:{}: invalid address '{}': {}",
                        path.display(),
                        lineno + 1,
                        addr,
                        e
                    ))
                })?),
                None => None,
            };

            if entries.iter().any(|(existing, _)| existing == name) {
                return Err(Error::Configure(format!(
                    "{}: hostname '{}' is listed more than once",
                    path.display(),
                    name
                )));
            }
            entries.push((name.to_string(), ip));
        }

        if entries.len() < n {
            return Err(Error::Configure(format!(
                "{} provides {} usable hostnames; {} are needed",
                path.display(),
                entries.len(),
                n
            )));
        }
        entries.truncate(n);
        debug!("Using {} hostnames from {}", n, path.display());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn address_of(&self, name: &str) -> Option<Ipv4Addr> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, ip)| *ip)
    }

    /// Hand out names in order
    pub fn allocator(&self) -> NameAllocator<'_> {
        NameAllocator {
            names: self.entries.iter().map(|(n, _)| n.as_str()).collect(),
            next: 0,
        }
    }
}

/// Sequential access to a fixed pool of hostnames
#[derive(Debug)]
pub struct NameAllocator<'a> {
    names: Vec<&'a str>,
    next: usize,
}

impl<'a> NameAllocator<'a> {
    /// The next unused name; running out means an architecture asked for
    /// more instances than it declared
    pub fn take(&mut self) -> Result<String> {
        let name = self.names.get(self.next).ok_or_else(|| {
            Error::Architecture(format!(
                "Ran out of hostnames after allocating {}",
                self.next
            ))
        })?;
        self.next += 1;
        Ok(name.to_string())
    }

    /// Take `n` names at once
    pub fn take_n(&mut self, n: usize) -> Result<Vec<String>> {
        (0..n).map(|_| self.take()).collect()
    }

    pub fn remaining(&self) -> usize {
        self.names.len() - self.next
    }
}
