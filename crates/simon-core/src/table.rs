//! GitHub-flavoured markdown table reading.
//!
//! The model answers table prompts with pipe tables, usually wrapped in some
//! prose. Only the first table in a document is read.

use crate::types::UseCase;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Index of the first header whose normalized form is in `candidates`.
    pub fn column(&self, candidates: &[&str]) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| candidates.contains(&normalize_header(h).as_str()))
    }
}

static SEPARATOR_RE: OnceLock<Regex> = OnceLock::new();

fn separator_re() -> &'static Regex {
    SEPARATOR_RE.get_or_init(|| {
        Regex::new(r"^\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?$").expect("static regex")
    })
}

/// Find and parse the first pipe table in `markdown`.
pub fn parse_first_table(markdown: &str) -> Option<Table> {
    let lines: Vec<&str> = markdown.lines().map(str::trim).collect();

    for i in 0..lines.len().saturating_sub(1) {
        let header = lines[i];
        if !header.contains('|') || !separator_re().is_match(lines[i + 1]) {
            continue;
        }
        let headers = split_row(header);
        if headers.is_empty() {
            continue;
        }

        let rows = lines[i + 2..]
            .iter()
            .take_while(|l| l.contains('|'))
            .map(|l| {
                let mut cells = split_row(l);
                cells.resize(headers.len(), String::new());
                cells
            })
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .collect();

        return Some(Table { headers, rows });
    }

    None
}

fn split_row(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(clean_cell).collect()
}

fn clean_cell(cell: &str) -> String {
    let cell = cell.trim();
    let cell = cell
        .strip_prefix("**")
        .and_then(|c| c.strip_suffix("**"))
        .unwrap_or(cell);
    cell.trim().replace("<br>", " ").replace("<br/>", " ")
}

/// Lowercase, and drop spaces, underscores, `#` and dots so `UC_ID`,
/// `UC ID` and `uc id #` compare equal.
fn normalize_header(h: &str) -> String {
    h.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '#' | '.' | '*'))
        .flat_map(char::to_lowercase)
        .collect()
}

const ID_HEADERS: &[&str] = &["ucid", "id", "item", "no", "usecaseid"];
const NAME_HEADERS: &[&str] = &["ucname", "name", "usecase", "usecasename"];
const DESCRIPTION_HEADERS: &[&str] = &["description", "ucdescription", "details"];

/// Read use cases out of a use case table. Rows without a name are skipped;
/// when the table has no id column, ids are numbered `UC-1`, `UC-2`, ...
pub fn extract_use_cases(table: &Table) -> Vec<UseCase> {
    let Some(name_col) = table.column(NAME_HEADERS) else {
        return Vec::new();
    };
    let id_col = table.column(ID_HEADERS);
    let desc_col = table.column(DESCRIPTION_HEADERS);

    table
        .rows
        .iter()
        .filter(|row| !row[name_col].is_empty())
        .enumerate()
        .map(|(i, row)| UseCase {
            id: id_col
                .map(|c| row[c].clone())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("UC-{}", i + 1)),
            name: row[name_col].clone(),
            description: desc_col.map(|c| row[c].clone()).unwrap_or_default(),
        })
        .collect()
}

/// Shortcut: first table in `markdown`, read as use cases.
pub fn use_cases_from_markdown(markdown: &str) -> Vec<UseCase> {
    parse_first_table(markdown)
        .map(|t| extract_use_cases(&t))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
