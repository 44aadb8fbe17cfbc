//! Commit graph walker.
//!
//! Turns the backend's raw graph rows into [`GraphRow`]s. A row is a run of
//! graph glyphs, optionally followed by whitespace and a full commit id. Rows
//! carrying an id must draw the node marker `*`, rows without one must not.
//! Glyphs are translated to their display form here so nothing downstream has
//! to know the backend's drawing characters.

use crate::backend::BackendError;

const SHAPE: &str = "graph row";

/// Display form of every glyph a graph row may contain. The node marker is
/// listed first so its substitution wins over the edge glyphs.
const GLYPHS: [(char, &str); 8] = [
    ('*', "●"),
    ('|', "│"),
    ('\\', "╲"),
    ('/', "╱"),
    ('_', "_"),
    ('-', "─"),
    ('.', "·"),
    (' ', " "),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphRow {
    /// Edges only, no commit on this row.
    Decoration { glyphs: String },
    Commit {
        glyphs: String,
        id: String,
        /// Position of the commit within the branch, the head is 0.
        rank: usize,
    },
}

impl GraphRow {
    pub fn glyphs(&self) -> &str {
        match self {
            GraphRow::Decoration { glyphs } | GraphRow::Commit { glyphs, .. } => glyphs,
        }
    }
}

fn translate(prefix: &str) -> Option<String> {
    let mut out = String::with_capacity(prefix.len() * 3);
    for c in prefix.chars() {
        let (_, glyph) = GLYPHS.iter().find(|(raw, _)| *raw == c)?;
        out.push_str(glyph);
    }
    Some(out)
}

fn is_commit_id(token: &str) -> bool {
    matches!(token.len(), 40 | 64) && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parses a single raw row. `line` is only used for error reporting.
pub fn parse_row(raw: &str, line: usize, rank: usize) -> Result<GraphRow, BackendError> {
    let malformed = || BackendError::Malformed {
        shape: SHAPE,
        line,
        text: raw.to_owned(),
    };
    let trimmed = raw.trim_end();
    let (prefix, id) = match trimmed.rsplit_once(char::is_whitespace) {
        Some((prefix, token)) if is_commit_id(token) => (prefix, Some(token)),
        _ if is_commit_id(trimmed) => ("", Some(trimmed)),
        _ => (trimmed, None),
    };
    let has_node = prefix.contains('*');
    let glyphs = translate(prefix).ok_or_else(malformed)?;
    match id {
        Some(id) if has_node => Ok(GraphRow::Commit {
            glyphs,
            id: id.to_owned(),
            rank,
        }),
        None if !has_node => Ok(GraphRow::Decoration { glyphs }),
        _ => Err(malformed()),
    }
}

/// Iterator over the parsed rows of one branch, in the order received.
pub struct Walker<I> {
    rows: I,
    line: usize,
    commits: usize,
}

pub fn walk<I: IntoIterator<Item = String>>(rows: I) -> Walker<I::IntoIter> {
    Walker {
        rows: rows.into_iter(),
        line: 0,
        commits: 0,
    }
}

impl<I: Iterator<Item = String>> Iterator for Walker<I> {
    type Item = Result<GraphRow, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.rows.next()?;
        self.line += 1;
        let row = parse_row(&raw, self.line, self.commits);
        if let Ok(GraphRow::Commit { .. }) = row {
            self.commits += 1;
        }
        Some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "1111111111111111111111111111111111111111";
    const B: &str = "2222222222222222222222222222222222222222";

    #[test]
    fn commit_row_keeps_id_and_translates_glyphs() {
        let row = parse_row(&format!("* | {A}"), 1, 0).unwrap();
        assert_eq!(
            row,
            GraphRow::Commit {
                glyphs: "● │".into(),
                id: A.into(),
                rank: 0,
            }
        );
    }

    #[test]
    fn decoration_row_has_no_commit() {
        let row = parse_row("|\\", 1, 0).unwrap();
        assert_eq!(row, GraphRow::Decoration { glyphs: "│╲".into() });
        let row = parse_row("| /", 1, 0).unwrap();
        assert_eq!(row.glyphs(), "│ ╱");
    }

    #[test]
    fn sha256_ids_are_accepted() {
        let id = "a".repeat(64);
        let row = parse_row(&format!("* {id}"), 1, 3).unwrap();
        assert!(matches!(row, GraphRow::Commit { rank: 3, .. }));
    }

    #[test]
    fn unknown_glyph_is_malformed() {
        assert!(parse_row(&format!("* # {A}"), 4, 0).is_err());
    }

    #[test]
    fn commit_without_node_is_malformed() {
        assert!(parse_row(&format!("| {A}"), 1, 0).is_err());
        assert!(parse_row(A, 1, 0).is_err());
    }

    #[test]
    fn node_without_commit_is_malformed() {
        assert!(parse_row("* |", 1, 0).is_err());
    }

    #[test]
    fn walker_ranks_commits_in_received_order() {
        let rows = vec![
            format!("* {A}"),
            "|\\".to_owned(),
            format!("| * {B}"),
        ];
        let rows: Vec<GraphRow> = walk(rows).collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 3);
        assert!(matches!(&rows[0], GraphRow::Commit { id, rank: 0, .. } if id == A));
        assert!(matches!(rows[1], GraphRow::Decoration { .. }));
        assert!(matches!(&rows[2], GraphRow::Commit { id, rank: 1, .. } if id == B));
    }

    #[test]
    fn walker_reports_line_of_bad_row() {
        let rows = vec![format!("* {A}"), "?".to_owned()];
        let result: Result<Vec<GraphRow>, _> = walk(rows).collect();
        assert!(matches!(
            result,
            Err(BackendError::Malformed { line: 2, .. })
        ));
    }
}
