use std::sync::LazyLock;

use regex::Regex;

use crate::lines::normalized_lines;

pub const LR: &str = "LR";
pub const PC: &str = "PC";
pub const CFSR: &str = "CFSR";
pub const MMAR: &str = "MMAR";
pub const BFAR: &str = "BFAR";

static REGISTER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([[:alnum:]]+)\s*:\s*0[xX]([[:xdigit:]]+)\s*$")
        .expect("register line pattern is valid")
});

/// A single `NAME : 0xVALUE` line of a fault dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRecord {
    /// Register name exactly as it appeared in the dump.
    pub name: String,
    pub value: u32,
}

impl RegisterRecord {
    /// Case-insensitive name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Parses one (already normalized) line into a register record.
///
/// Returns `None` for anything that is not a register line, including values that do not fit
/// into 32 bits.
pub fn parse_register_line(line: &str) -> Option<RegisterRecord> {
    let captures = REGISTER_LINE.captures(line)?;
    let name = &captures[1];
    let value = match u32::from_str_radix(&captures[2], 16) {
        Ok(value) => value,
        Err(err) => {
            tracing::trace!("ignoring register {name}: {err}");
            return None;
        }
    };

    Some(RegisterRecord {
        name: name.to_owned(),
        value,
    })
}

/// All register records of one fault dump, in input order.
///
/// Duplicates are kept; lookups return the first record with a matching name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterSet {
    records: Vec<RegisterRecord>,
}

impl RegisterSet {
    pub fn parse(text: &str) -> Self {
        normalized_lines(text)
            .filter_map(parse_register_line)
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.records
            .iter()
            .find(|record| record.is(name))
            .map(|record| record.value)
    }

    pub fn records(&self) -> &[RegisterRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<RegisterRecord> for RegisterSet {
    fn from_iter<I: IntoIterator<Item = RegisterRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
