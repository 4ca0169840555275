//! Indentation-based folding ranges.
//!
//! Any line followed by more deeply indented lines folds down to the last of
//! them. Blank lines neither open nor close a fold. Mixins, blocks and
//! control flow fold as regions and `//` comments as comments; every other
//! construct (tags, `+calls`, pipes) folds without a kind.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{FoldingRange, FoldingRangeKind};

use crate::workspace::Workspace;

static REGION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:mixin|block|append|prepend|if|else|unless|case|when|default|each|for|while)\b",
    )
    .expect("region keyword regex")
});

const TAB_WIDTH: usize = 4;

pub fn folding_ranges(workspace: &Workspace, path: &Path) -> Option<Vec<FoldingRange>> {
    let text = workspace.documents().read_blocking(path).ok()?;
    Some(fold(&text))
}

struct Open {
    line: u32,
    indent: usize,
    kind: Option<FoldingRangeKind>,
}

fn fold(text: &str) -> Vec<FoldingRange> {
    let mut ranges = Vec::new();
    let mut open: Vec<Open> = Vec::new();
    let mut last_content = 0;

    for (i, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let line_no = i as u32;
        let indent = indentation(line);

        while open.last().is_some_and(|header| header.indent >= indent) {
            if let Some(header) = open.pop() {
                close(&mut ranges, header, last_content);
            }
        }

        open.push(Open {
            line: line_no,
            indent,
            kind: kind(trimmed),
        });
        last_content = line_no;
    }

    while let Some(header) = open.pop() {
        close(&mut ranges, header, last_content);
    }

    ranges.sort_by_key(|range| (range.start_line, range.end_line));
    ranges
}

fn close(ranges: &mut Vec<FoldingRange>, header: Open, end_line: u32) {
    if end_line > header.line {
        ranges.push(FoldingRange {
            start_line: header.line,
            end_line,
            kind: header.kind,
            ..Default::default()
        });
    }
}

fn indentation(line: &str) -> usize {
    line.chars()
        .map_while(|ch| match ch {
            ' ' => Some(1),
            '\t' => Some(TAB_WIDTH),
            _ => None,
        })
        .sum()
}

fn kind(trimmed: &str) -> Option<FoldingRangeKind> {
    if trimmed.starts_with("//") {
        Some(FoldingRangeKind::Comment)
    } else if REGION_RE.is_match(trimmed) {
        Some(FoldingRangeKind::Region)
    } else {
        None
    }
}
