use super::PriceHistory;

const HEADERS: [&str; 6] = ["Date", "Open", "High", "Low", "Close", "Volume"];

pub(super) fn render(history: &PriceHistory) -> String {
    if history.is_empty() {
        return format!(
            "Empty table\nColumns: [{}]\nIndex: []",
            HEADERS[1..].join(", ")
        );
    }

    let rows: Vec<[String; 6]> = history
        .bars
        .iter()
        .map(|b| {
            [
                b.timestamp.format("%Y-%m-%d").to_string(),
                format!("{:.2}", b.open),
                format!("{:.2}", b.high),
                format!("{:.2}", b.low),
                format!("{:.2}", b.close),
                b.volume.to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &HEADERS.map(String::from), &widths);
    for row in &rows {
        push_line(&mut out, row, &widths);
    }
    out.truncate(out.trim_end().len());
    out
}

// Date is left-aligned, numbers right-aligned.
fn push_line(out: &mut String, cells: &[String; 6], widths: &[usize; 6]) {
    let mut line = String::new();
    for (i, (cell, w)) in cells.iter().zip(widths.iter().copied()).enumerate() {
        if i == 0 {
            line.push_str(&format!("{cell:<w$}"));
        } else {
            line.push_str(&format!("  {cell:>w$}"));
        }
    }
    out.push_str(line.trim_end());
    out.push('\n');
}
