//! Chunk file naming
//!
//! `carla_cmd{code}_{Name}_{YYYYMMDD_HHMMSS}[_part{NNN}].{ext}`
//!
//! Everything needed to order and label a chunk is recoverable from the
//! name alone.

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use contracts::{ContainerFormat, NavigationCommand};

const PREFIX: &str = "carla_cmd";
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Highest part index representable with three digits.
pub const MAX_PART: u32 = 999;

/// Parsed or to-be-written chunk file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkName {
    pub command: NavigationCommand,
    pub timestamp: String,
    pub part: Option<u32>,
    pub format: ContainerFormat,
}

impl ChunkName {
    pub fn new(
        command: NavigationCommand,
        timestamp: impl Into<String>,
        part: Option<u32>,
        format: ContainerFormat,
    ) -> Self {
        Self {
            command,
            timestamp: timestamp.into(),
            part,
            format,
        }
    }

    /// Collection timestamp in the file-name format.
    pub fn stamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
    where
        Tz::Offset: fmt::Display,
    {
        at.format(STAMP_FORMAT).to_string()
    }

    pub fn stamp_now() -> String {
        Self::stamp(&Local::now())
    }

    /// Name without extension or part suffix.
    pub fn stem(&self) -> String {
        format!(
            "{PREFIX}{}_{}_{}",
            self.command.code(),
            self.command.name(),
            self.timestamp
        )
    }

    pub fn file_name(&self) -> String {
        match self.part {
            Some(part) => format!("{}_part{part:03}.{}", self.stem(), self.format.extension()),
            None => format!("{}.{}", self.stem(), self.format.extension()),
        }
    }

    /// Parse a file name produced by [`ChunkName::file_name`].
    pub fn parse(file_name: &str) -> Option<Self> {
        let (base, ext) = file_name.rsplit_once('.')?;
        let format = ContainerFormat::from_extension(ext)?;
        let rest = base.strip_prefix(PREFIX)?;

        let (code, rest) = rest.split_once('_')?;
        let code: i32 = code.parse().ok()?;
        let command = NavigationCommand::from_code(code);

        let (name, rest) = rest.split_once('_')?;
        if command.is_known() && name != command.name() {
            return None;
        }

        let (timestamp, part) = match rest.split_once("_part") {
            Some((ts, part)) => (ts, Some(part.parse::<u32>().ok()?)),
            None => (rest, None),
        };
        NaiveDateTime::parse_from_str(timestamp, STAMP_FORMAT).ok()?;

        Some(Self::new(command, timestamp, part, format))
    }

    /// Ordering key: collection time, then part index.
    pub fn sort_key(&self) -> (String, u32) {
        (self.timestamp.clone(), self.part.unwrap_or(0))
    }
}

impl fmt::Display for ChunkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}
