use std::fmt;

use crate::{
    backtrace::{self, BacktraceFrame},
    cfsr,
    cortexm::format_word,
    registers::{RegisterSet, BFAR, CFSR, LR, MMAR, PC},
    SymbolInfo, Symbolizer, Table,
};

/// Knobs for how a report is put together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// Show the full source path instead of just the file name in `File:Line` cells.
    pub full_paths: bool,
    /// Stop after this many backtrace frames.
    pub backtrace_limit: Option<usize>,
}

/// What a failed symbol lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Register(&'static str),
    /// Backtrace frame, by position.
    Frame(u32),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Register(name) => write!(f, "register {name}"),
            Subject::Frame(position) => write!(f, "frame #{position}"),
        }
    }
}

/// An address that could not be symbolized. The report still contains its row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub subject: Subject,
    pub address: u32,
    /// The lookup error, `None` if the address is simply not covered by the image.
    pub reason: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not symbolize {} at {}: ",
            self.subject,
            format_word(self.address)
        )?;
        match &self.reason {
            Some(reason) => f.write_str(reason),
            None => f.write_str("address not found in the image"),
        }
    }
}

/// Resolves `address`, recording (and logging) a diagnostic when that does not work out.
pub(crate) fn resolve_or_diagnose(
    symbolizer: &dyn Symbolizer,
    subject: Subject,
    address: u32,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<SymbolInfo> {
    let reason = match symbolizer.resolve(address) {
        Ok(Some(info)) => return Some(info),
        Ok(None) => None,
        Err(err) => Some(err.to_string()),
    };

    let diagnostic = Diagnostic {
        subject,
        address,
        reason,
    };
    tracing::warn!("{diagnostic}");
    diagnostics.push(diagnostic);
    None
}

/// The two tables of an analyzed fault dump, plus everything that could not be symbolized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub registers: Table,
    pub backtrace: Table,
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.registers)?;
        writeln!(f)?;
        write!(f, "{}", self.backtrace)
    }
}

/// Runs the whole pipeline over the raw text of a fault dump.
pub fn analyze(text: &str, symbolizer: &dyn Symbolizer, options: &ReportOptions) -> Report {
    let mut diagnostics = vec![];

    let registers = RegisterSet::parse(text);
    tracing::debug!("parsed {} register lines", registers.records().len());
    let registers = register_table(&registers, symbolizer, options, &mut diagnostics);

    let mut frames = backtrace::parse_backtrace(text);
    tracing::debug!("parsed {} backtrace frames", frames.len());
    if let Some(limit) = options.backtrace_limit {
        if frames.len() > limit {
            tracing::warn!(
                "maximum backtrace length of {limit} reached; cutting off {} frames",
                frames.len() - limit
            );
            frames.truncate(limit);
        }
    }
    backtrace::symbolize(&mut frames, symbolizer, &mut diagnostics);
    let backtrace = backtrace_table(&frames, options);

    Report {
        registers,
        backtrace,
        diagnostics,
    }
}

/// `Register, Value` table: `LR` and `PC` with their symbols, then the decoded CFSR.
pub fn register_table(
    registers: &RegisterSet,
    symbolizer: &dyn Symbolizer,
    options: &ReportOptions,
    diagnostics: &mut Vec<Diagnostic>,
) -> Table {
    let mut table = Table::with_header(["Register", "Value"]);

    for name in [LR, PC] {
        let Some(value) = registers.get(name) else {
            continue;
        };

        let resolved = resolve_or_diagnose(symbolizer, Subject::Register(name), value, diagnostics);
        let (function, location) = resolved
            .map(|info| {
                let location = info.location(options.full_paths);
                (info.function_name, location)
            })
            .unwrap_or_default();
        table.push_row([name.to_owned(), format_word(value), function, location]);
    }

    if let Some(value) = registers.get(CFSR) {
        let blocks = cfsr::decode(value, registers.get(MMAR), registers.get(BFAR));
        for block in blocks {
            table.push_row([block.category.title()]);
            for finding in block.findings {
                let mut row = vec![
                    String::new(),
                    finding.flag_name.to_owned(),
                    finding.description.to_owned(),
                ];
                row.extend(finding.extra_detail);
                table.push_row(row);
            }
        }
    }

    table
}

/// `#, Function, Address, PC, File:Line` table, one row per frame in the given order.
pub fn backtrace_table(frames: &[BacktraceFrame], options: &ReportOptions) -> Table {
    let mut table = Table::with_header(["#", "Function", "Address", "PC", "File:Line"]);

    for frame in frames {
        let location = frame
            .resolved
            .as_ref()
            .map(|info| info.location(options.full_paths))
            .unwrap_or_default();

        table.push_row([
            frame.position.to_string(),
            frame.function_label(),
            format!(
                "{}+{}",
                format_word(frame.function_address),
                frame.function_offset
            ),
            format_word(frame.program_counter),
            location,
        ]);
    }

    table
}
