use std::fmt;

/// Blank columns between two cells.
const COLUMN_GAP: usize = 2;

/// Rows of string cells rendered as left-aligned, whitespace separated columns.
///
/// Rows do not need to have the same number of cells; a short row simply ends early and does
/// not influence the width of the columns it does not have.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        table.push_row(header);
        table
    }

    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Width of every column: the longest cell observed at that position.
    pub fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![];
        for row in &self.rows {
            for (column, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(column) {
                    Some(width) => *width = len.max(*width),
                    None => widths.push(len),
                }
            }
        }
        widths
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();
        for row in &self.rows {
            for (cell, width) in row.iter().zip(&widths) {
                write!(f, "{:<width$}", cell, width = width + COLUMN_GAP)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample() -> Table {
        let mut table = Table::with_header(["Register", "Value"]);
        table.push_row(["LR", "0x08001234", "main", "main.c:10"]);
        table.push_row(["UsageFault"]);
        table.push_row(["", "UNDEFINSTR", "Undefined instruction"]);
        table
    }

    #[test]
    fn widths_are_the_longest_cell_per_column() {
        assert_eq!(sample().column_widths(), [10, 10, 21, 9]);
    }

    #[test]
    fn cells_are_padded_and_short_rows_end_early() {
        let expected = concat!(
            "Register    Value       \n",
            "LR          0x08001234  main                   main.c:10  \n",
            "UsageFault  \n",
            "            UNDEFINSTR  Undefined instruction  \n",
        );

        assert_eq!(sample().to_string(), expected);
    }

    #[test]
    fn rendering_is_deterministic() {
        let table = sample();

        assert_eq!(table.to_string(), table.to_string());
        assert_eq!(table.to_string(), sample().to_string());
    }

    #[test]
    fn header_only() {
        let table = Table::with_header(["#", "Function"]);

        assert_eq!(table.to_string(), "#  Function  \n");
    }

    #[test]
    fn empty_table_renders_nothing() {
        assert_eq!(Table::new().to_string(), "");
        assert!(Table::new().column_widths().is_empty());
    }
}
