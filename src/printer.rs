//! Console table rendering.

/// Render `header` and `rows` as a box-drawn grid.
///
/// ```
/// let table = gdrive2sheet::printer::render_table(&["Name"], &[vec!["a".to_string()]]);
/// assert!(table.contains("│ Name │"));
/// ```
pub fn render_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let columns = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);

    let mut widths = vec![0usize; columns];
    for (i, h) in header.iter().enumerate() {
        widths[i] = widths[i].max(h.chars().count());
    }
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let rule = |left: &str, fill: &str, mid: &str, right: &str| -> String {
        let segments: Vec<String> = widths.iter().map(|w| fill.repeat(w + 2)).collect();
        format!("{}{}{}\n", left, segments.join(mid), right)
    };

    let line = |cells: &[&str]| -> String {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let cell = cells.get(i).copied().unwrap_or("");
                let pad = w - cell.chars().count();
                format!(" {}{} ", cell, " ".repeat(pad))
            })
            .collect();
        format!("│{}│\n", padded.join("│"))
    };

    let mut out = rule("╒", "═", "╤", "╕");
    out.push_str(&line(header));
    out.push_str(&rule("╞", "═", "╪", "╡"));

    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push_str(&rule("├", "─", "┼", "┤"));
        }
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&line(&cells));
    }

    out.push_str(&rule("╘", "═", "╧", "╛"));
    out
}

/// Print the table to standard output.
pub fn print_table(header: &[&str], rows: &[Vec<String>]) {
    print!("{}", render_table(header, rows));
}
