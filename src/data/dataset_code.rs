use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SolverError};

/// Control setting for one stain channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StainLevel {
    Minus,
    Neutral,
    Plus,
}

impl StainLevel {
    /// Parses the command-line form: -1, 0 or 1.
    pub fn from_flag(flag: i64) -> Result<StainLevel> {
        match flag {
            -1 => Ok(StainLevel::Minus),
            0 => Ok(StainLevel::Neutral),
            1 => Ok(StainLevel::Plus),
            other => Err(SolverError::invalid_input(format!(
                "stain flag must be -1, 0 or 1, got {}",
                other
            ))),
        }
    }

    pub fn as_char(self) -> char {
        match self {
            StainLevel::Minus => '-',
            StainLevel::Neutral => '.',
            StainLevel::Plus => '+',
        }
    }

    pub fn from_char(c: char) -> Option<StainLevel> {
        match c {
            '-' => Some(StainLevel::Minus),
            '.' => Some(StainLevel::Neutral),
            '+' => Some(StainLevel::Plus),
            _ => None,
        }
    }
}

/// Dataset selector: hematoxylin, eosin and thickness levels, rendered as
/// `H<h>E<e>T<t>` (e.g. `H.E+T-`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetCode {
    pub hematoxylin: StainLevel,
    pub eosin: StainLevel,
    pub thickness: StainLevel,
}

impl DatasetCode {
    pub fn new(hematoxylin: StainLevel, eosin: StainLevel, thickness: StainLevel) -> DatasetCode {
        DatasetCode { hematoxylin, eosin, thickness }
    }

    /// The code with characters unsafe in directory names replaced.
    pub fn sanitized(&self) -> String {
        sanitize(&self.to_string())
    }
}

impl Default for DatasetCode {
    fn default() -> Self {
        DatasetCode::new(StainLevel::Neutral, StainLevel::Neutral, StainLevel::Neutral)
    }
}

impl fmt::Display for DatasetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "H{}E{}T{}",
            self.hematoxylin.as_char(),
            self.eosin.as_char(),
            self.thickness.as_char()
        )
    }
}

impl FromStr for DatasetCode {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<DatasetCode> {
        let chars: Vec<char> = s.chars().collect();
        let invalid = || SolverError::invalid_input(format!("malformed dataset code '{}'", s));
        if chars.len() != 6 || chars[0] != 'H' || chars[2] != 'E' || chars[4] != 'T' {
            return Err(invalid());
        }
        let level = |c: char| StainLevel::from_char(c).ok_or_else(invalid);
        Ok(DatasetCode::new(level(chars[1])?, level(chars[3])?, level(chars[5])?))
    }
}

/// Replaces `+`, `-` and `.` with `p`, `m` and `o`.
pub fn sanitize(code: &str) -> String {
    code.chars()
        .map(|c| match c {
            '+' => 'p',
            '-' => 'm',
            '.' => 'o',
            other => other,
        })
        .collect()
}
