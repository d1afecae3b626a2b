/// Prefix a serial terminal puts in front of every line it echoes back.
const RECV_MARKER: &str = "recv: ";

/// Strips a leading `recv: ` marker, compared case-insensitively, from a single line.
///
/// Nothing else about the line is changed.
pub fn normalize_line(line: &str) -> &str {
    match line.get(..RECV_MARKER.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(RECV_MARKER) => &line[RECV_MARKER.len()..],
        _ => line,
    }
}

/// Splits raw input into lines and normalizes each of them.
pub fn normalized_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(normalize_line)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    #[test_case("recv: CFSR : 0x00010000"; "lowercase")]
    #[test_case("Recv: CFSR : 0x00010000"; "capitalized")]
    #[test_case("RECV: CFSR : 0x00010000"; "uppercase")]
    #[test_case("CFSR : 0x00010000"; "no marker")]
    fn marker_is_stripped(line: &str) {
        assert_eq!(normalize_line(line), "CFSR : 0x00010000");
    }

    #[test_case("  recv: PC : 0x1"; "indented marker")]
    #[test_case("recv:PC : 0x1"; "missing space")]
    #[test_case("rec"; "shorter than marker")]
    #[test_case(""; "empty")]
    fn other_lines_are_untouched(line: &str) {
        assert_eq!(normalize_line(line), line);
    }

    #[test]
    fn multibyte_input_does_not_panic() {
        assert_eq!(normalize_line("récv: x"), "récv: x");
    }

    #[test]
    fn every_line_is_normalized() {
        let text = "recv: LR : 0x1\r\nPC : 0x2\nRecv: #0 : f@0x0+0 PC:0x0";
        let lines: Vec<_> = normalized_lines(text).collect();

        assert_eq!(lines, ["LR : 0x1", "PC : 0x2", "#0 : f@0x0+0 PC:0x0"]);
    }
}
