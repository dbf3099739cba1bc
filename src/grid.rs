//! Plain-text rendering of a [`Snapshot`]
//!
//! Used by the CLI. The first column is the row index that `edit` and
//! `delete` take.

use crate::db::types::Snapshot;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const MIN_WIDTH: usize = 1;
const MAX_WIDTH: usize = 40;
const SAMPLE_ROWS: usize = 100;

/// Render `snapshot` with `null_display` standing in for NULL
pub fn render(snapshot: &Snapshot, null_display: &str) -> String {
    let index_width = snapshot.rows.len().saturating_sub(1).to_string().len().max(1);
    let widths = compute_column_widths(snapshot, null_display);

    let mut out = String::new();

    let mut header = vec![pad("#", index_width)];
    header.extend(
        snapshot
            .columns
            .iter()
            .zip(&widths)
            .map(|(name, w)| pad(&truncate(name, *w), *w)),
    );
    push_line(&mut out, &header.join(" | "));

    let mut rule = vec!["-".repeat(index_width)];
    rule.extend(widths.iter().map(|w| "-".repeat(*w)));
    push_line(&mut out, &rule.join("-+-"));

    for (idx, row) in snapshot.rows.iter().enumerate() {
        let mut cells = vec![pad(&idx.to_string(), index_width)];
        for (col, w) in widths.iter().enumerate() {
            let text = row.get(col).unwrap_or(null_display);
            cells.push(pad(&truncate(&single_line(text), *w), *w));
        }
        push_line(&mut out, &cells.join(" | "));
    }

    let noun = if snapshot.rows.len() == 1 { "row" } else { "rows" };
    out.push_str(&format!("({} {})\n", snapshot.rows.len(), noun));
    out
}

fn compute_column_widths(snapshot: &Snapshot, null_display: &str) -> Vec<usize> {
    let mut widths: Vec<usize> = snapshot.columns.iter().map(|c| c.width()).collect();

    // Sample the first rows only
    for row in snapshot.rows.iter().take(SAMPLE_ROWS) {
        for (i, w) in widths.iter_mut().enumerate() {
            let text = row.get(i).unwrap_or(null_display);
            *w = (*w).max(single_line(text).width());
        }
    }

    for w in &mut widths {
        *w = (*w).clamp(MIN_WIDTH, MAX_WIDTH);
    }
    widths
}

fn single_line(s: &str) -> String {
    s.replace(['\n', '\r', '\t'], " ")
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn pad(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(s.width());
    format!("{}{}", s, " ".repeat(fill))
}

/// Cut `s` to at most `max` display columns, ending in an ellipsis when cut
fn truncate(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    let budget = max.saturating_sub(1);
    let mut used = 0;
    let mut out = String::new();
    for c in s.chars() {
        let cw = c.width().unwrap_or(0);
        if used + cw > budget {
            break;
        }
        used += cw;
        out.push(c);
    }
    out.push('…');
    out
}
