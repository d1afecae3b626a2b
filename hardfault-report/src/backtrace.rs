use std::sync::LazyLock;

use regex::Regex;

use crate::{
    cortexm::UNKNOWN_SYMBOL,
    lines::normalized_lines,
    report::{resolve_or_diagnose, Diagnostic, Subject},
    SymbolInfo, Symbolizer,
};

static BACKTRACE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*#(\d+)\s*:\s*(\S+?)@0[xX]([[:xdigit:]]+)\+(\d+)\s+PC\s*:\s*0[xX]([[:xdigit:]]+)\s*$",
    )
    .expect("backtrace line pattern is valid")
});

/// One frame of the call stack unwound by the firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktraceFrame {
    /// Stack depth, `0` being the innermost frame.
    pub position: u32,
    /// Symbol name as printed by the firmware, `unknown` if it had none.
    pub symbol_name: String,
    pub function_address: u32,
    /// Byte offset of `program_counter` within the function.
    pub function_offset: u32,
    pub program_counter: u32,
    pub resolved: Option<SymbolInfo>,
}

impl BacktraceFrame {
    /// `<function> (<symbol name>)`, leaving out whatever part is not known.
    pub fn function_label(&self) -> String {
        match &self.resolved {
            Some(info) if self.symbol_name == UNKNOWN_SYMBOL => info.function_name.clone(),
            Some(info) => format!("{} ({})", info.function_name, self.symbol_name),
            None => self.symbol_name.clone(),
        }
    }
}

/// Parses one (already normalized) `#N : name@0xADDR+OFFSET PC:0xPC` line.
pub fn parse_backtrace_line(line: &str) -> Option<BacktraceFrame> {
    let captures = BACKTRACE_LINE.captures(line)?;

    let frame = (|| {
        Some(BacktraceFrame {
            position: captures[1].parse().ok()?,
            symbol_name: captures[2].to_owned(),
            function_address: u32::from_str_radix(&captures[3], 16).ok()?,
            function_offset: captures[4].parse().ok()?,
            program_counter: u32::from_str_radix(&captures[5], 16).ok()?,
            resolved: None,
        })
    })();

    if frame.is_none() {
        tracing::trace!("ignoring backtrace line with out of range numbers: {line}");
    }
    frame
}

/// All backtrace frames of a fault dump, unresolved and in input order.
pub fn parse_backtrace(text: &str) -> Vec<BacktraceFrame> {
    normalized_lines(text)
        .filter_map(parse_backtrace_line)
        .collect()
}

/// Looks up every frame's program counter.
///
/// Frames the symbolizer cannot resolve stay in place with `resolved == None`; a diagnostic is
/// recorded for each of them.
pub fn symbolize(
    frames: &mut [BacktraceFrame],
    symbolizer: &dyn Symbolizer,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for frame in frames {
        frame.resolved = resolve_or_diagnose(
            symbolizer,
            Subject::Frame(frame.position),
            frame.program_counter,
            diagnostics,
        );
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;
    use crate::test::FakeSymbolizer;

    fn frame(
        position: u32,
        name: &str,
        function_address: u32,
        offset: u32,
        pc: u32,
    ) -> BacktraceFrame {
        BacktraceFrame {
            position,
            symbol_name: name.to_owned(),
            function_address,
            function_offset: offset,
            program_counter: pc,
            resolved: None,
        }
    }

    #[test]
    fn example_line() {
        assert_eq!(
            parse_backtrace_line("#1 : unknown@0x0001C38C+182 PC:0x0001C442"),
            Some(frame(1, "unknown", 0x1c38c, 182, 0x1c442))
        );
    }

    #[test_case("#0:main@0x08000100+4 PC:0x08000104"; "compact")]
    #[test_case("  #0  :  main@0X08000100+4   PC : 0x08000104  "; "loose whitespace")]
    fn whitespace_is_tolerated(line: &str) {
        assert_eq!(
            parse_backtrace_line(line),
            Some(frame(0, "main", 0x0800_0100, 4, 0x0800_0104))
        );
    }

    #[test]
    fn symbol_names_keep_their_punctuation() {
        let parsed = parse_backtrace_line("#3 : _ZN3app4main17h1@0x100+0 PC:0x100").unwrap();

        assert_eq!(parsed.symbol_name, "_ZN3app4main17h1");
    }

    #[test_case("CFSR : 0x00010000"; "register line")]
    #[test_case("#1 : unknown@0x0001C38C+0x10 PC:0x0001C442"; "hex offset")]
    #[test_case("#1 : unknown@0x0001C38C+182"; "missing pc")]
    #[test_case("#x : unknown@0x0001C38C+182 PC:0x0001C442"; "non decimal position")]
    #[test_case("#1 : unknown@0x1C38C+182 PC:0x1C442 <- fault"; "trailing text")]
    #[test_case("#1 : unknown@0x100000000+0 PC:0x0"; "address wider than 32 bits")]
    #[test_case("#99999999999 : f@0x0+0 PC:0x0"; "position out of range")]
    fn other_lines_do_not_match(line: &str) {
        assert_eq!(parse_backtrace_line(line), None);
    }

    #[test]
    fn frames_keep_input_order() {
        let text = "\
            Recv: #2 : outer@0x300+2 PC:0x302\n\
            unrelated\n\
            #0 : inner@0x100+0 PC:0x100\n\
            recv: #1 : middle@0x200+8 PC:0x208\n";
        let positions: Vec<_> = parse_backtrace(text)
            .iter()
            .map(|frame| frame.position)
            .collect();

        assert_eq!(positions, [2, 0, 1]);
    }

    #[test]
    fn unresolved_frames_are_kept() {
        let symbolizer = FakeSymbolizer::default()
            .with(0x100, "inner", "/src/a.c", 3)
            .failing(0x302);
        let mut frames = parse_backtrace(
            "#0 : inner@0x100+0 PC:0x100\n#1 : unknown@0x200+8 PC:0x208\n#2 : outer@0x300+2 PC:0x302",
        );
        let mut diagnostics = vec![];

        symbolize(&mut frames, &symbolizer, &mut diagnostics);

        assert_eq!(frames.len(), 3);
        assert_eq!(
            frames[0].resolved,
            Some(SymbolInfo::new("inner", "/src/a.c", 3))
        );
        assert_eq!(frames[1].resolved, None);
        assert_eq!(frames[2].resolved, None);

        let subjects: Vec<_> = diagnostics
            .iter()
            .map(|diagnostic| (diagnostic.subject, diagnostic.address, diagnostic.reason.is_some()))
            .collect();
        assert_eq!(
            subjects,
            [
                (Subject::Frame(1), 0x208, false),
                (Subject::Frame(2), 0x302, true)
            ]
        );
    }

    #[test_case("app::run", Some("app::run"), "app::run (app::run)"; "named and resolved")]
    #[test_case("unknown", Some("app::run"), "app::run"; "placeholder and resolved")]
    #[test_case("raw_name", None, "raw_name"; "named and unresolved")]
    #[test_case("unknown", None, "unknown"; "placeholder and unresolved")]
    fn function_labels(symbol_name: &str, resolved: Option<&str>, expected: &str) {
        let mut frame = frame(0, symbol_name, 0, 0, 0);
        frame.resolved = resolved.map(|function| SymbolInfo::new(function, "", 0));

        assert_eq!(frame.function_label(), expected);
    }
}
