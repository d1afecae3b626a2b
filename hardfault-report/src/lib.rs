//! Post-mortem analysis of ARM Cortex-M hard faults
//!
//! Firmware that catches a hard fault usually dumps its fault registers and an
//! unwound call stack over a serial line:
//!
//! ```text
//! LR   : 0x08001235
//! PC   : 0x08005678
//! CFSR : 0x00008200
//! BFAR : 0x20010000
//! #0 : HardFault_Handler@0x08000400+12 PC:0x0800040C
//! #1 : unknown@0x0001C38C+182 PC:0x0001C442
//! ```
//!
//! This crate turns such a dump, together with a [`Symbolizer`] for the firmware
//! image, into a [`Report`]: a register/fault table with the decoded CFSR and a
//! symbolized backtrace table.
//!
//! ```no_run
//! use hardfault_report::{analyze, Addr2LineTool, ReportOptions};
//!
//! let dump = std::fs::read_to_string("fault.log").unwrap();
//! let symbolizer = Addr2LineTool::new("arm-none-eabi-addr2line", "firmware.elf").unwrap();
//! let report = analyze(&dump, &symbolizer, &ReportOptions::default());
//! print!("{report}");
//! ```

/// Parsing of unwound call-stack lines and their symbolication.
pub mod backtrace;
/// Decoding of the Configurable Fault Status Register.
pub mod cfsr;
/// ARM Cortex-M specific helpers.
pub mod cortexm;
/// Removal of serial terminal artifacts from raw input lines.
pub mod lines;
/// Parsing of `NAME : 0xVALUE` register lines.
pub mod registers;
/// Assembly of the register/fault and backtrace tables.
pub mod report;
/// Address to source location resolution.
pub mod symbolizer;
/// Column aligned plain text tables.
pub mod table;

pub use self::{
    backtrace::BacktraceFrame,
    cfsr::{CfsrFinding, FaultBlock, FaultCategory},
    registers::{RegisterRecord, RegisterSet},
    report::{analyze, Diagnostic, Report, ReportOptions},
    symbolizer::{
        Addr2LineTool, CachingSymbolizer, DebugInfoSymbolizer, SymbolInfo, Symbolizer,
        SymbolizerError,
    },
    table::Table,
};
