use std::{
    fs,
    io::{self, BufRead, IsTerminal, Read},
    path::Path,
};

use anyhow::Context;

/// Reads the fault dump from `path`, or from stdin when no path or `-` is given.
///
/// Serial captures regularly contain garbage bytes, so the input is decoded lossily.
pub fn read_dump(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) if path != Path::new("-") => {
            let bytes = fs::read(path)
                .with_context(|| format!("failed to read fault dump {}", path.display()))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => read_stdin().context("failed to read fault dump from stdin"),
    }
}

fn read_stdin() -> io::Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprintln!("Paste the fault dump, finish with an empty line:");
        return read_until_blank(stdin.lock());
    }

    let mut bytes = vec![];
    stdin.lock().read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Collects lines up to the first blank one or end of input.
fn read_until_blank(mut reader: impl BufRead) -> io::Result<String> {
    let mut dump = String::new();
    let mut line = vec![];
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        if text.trim().is_empty() {
            break;
        }
        dump.push_str(&text);
    }
    Ok(dump)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn interactive_input_stops_at_blank_line() {
        let input = Cursor::new("LR : 0x1\r\nPC : 0x2\n\nCFSR : 0x3\n");

        assert_eq!(read_until_blank(input).unwrap(), "LR : 0x1\r\nPC : 0x2\n");
    }

    #[test]
    fn interactive_input_stops_at_end_of_input() {
        let input = Cursor::new("LR : 0x1\nPC : 0x2");

        assert_eq!(read_until_blank(input).unwrap(), "LR : 0x1\nPC : 0x2");
    }

    #[test]
    fn dump_files_tolerate_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fault.log");
        fs::write(&path, b"\xffLR : 0x08001234\n").unwrap();

        let dump = read_dump(Some(&path)).unwrap();

        assert_eq!(dump, "\u{fffd}LR : 0x08001234\n");
    }

    #[test]
    fn missing_dump_file_names_the_path() {
        let error = read_dump(Some(Path::new("/nonexistent/fault.log"))).unwrap_err();

        assert!(format!("{error:#}").contains("/nonexistent/fault.log"));
    }
}
