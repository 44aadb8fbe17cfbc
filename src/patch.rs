//! Parser for unified diff text.
//!
//! Grammar, one file section at a time:
//!
//! ```text
//! section := "diff --git a/<old> b/<new>" header* hunk*
//! header  := any line that does not start with "@@" (index, mode, ---, +++, Binary ...)
//! hunk    := "@@" ... then lines starting with ' ', '+', '-' or '\'
//! ```
//!
//! Anything else, including content before the first section, is malformed.

use crate::backend::{BackendError, DiffStat};

const SHAPE: &str = "diff";

/// Splits a `diff --git a/<old> b/<new>` line into its two paths.
///
/// Paths may themselves contain ` b/`. When both sides name the same file the
/// split is at the middle, otherwise at the last separator; section parsing
/// then takes the new path from the `+++` line when there is one.
pub fn parse_header(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("diff --git a/")?;
    if rest.len() > 3 && (rest.len() - 3) % 2 == 0 {
        let half = (rest.len() - 3) / 2;
        if let (Some(old), Some(" b/"), Some(new)) =
            (rest.get(..half), rest.get(half..half + 3), rest.get(half + 3..))
        {
            if old == new {
                return Some((old, new));
            }
        }
    }
    rest.rsplit_once(" b/")
}

enum State {
    Start,
    Header,
    Hunk,
}

/// Per-file insertion and deletion counts, in patch order.
pub fn stats(patch: &str) -> Result<Vec<DiffStat>, BackendError> {
    let mut stats: Vec<DiffStat> = Vec::new();
    let mut state = State::Start;
    for (i, line) in patch.lines().enumerate() {
        let malformed = || BackendError::Malformed {
            shape: SHAPE,
            line: i + 1,
            text: line.to_owned(),
        };
        if line.starts_with("diff --git ") {
            let (_, new) = parse_header(line).ok_or_else(malformed)?;
            stats.push(DiffStat {
                path: new.to_owned(),
                insertions: 0,
                deletions: 0,
            });
            state = State::Header;
            continue;
        }
        match state {
            State::Start => {
                if !line.is_empty() {
                    return Err(malformed());
                }
            }
            State::Header => {
                if line.starts_with("@@") {
                    state = State::Hunk;
                } else if let Some(path) = line.strip_prefix("+++ b/") {
                    if let Some(current) = stats.last_mut() {
                        current.path = path.to_owned();
                    }
                }
            }
            State::Hunk => {
                let Some(current) = stats.last_mut() else {
                    return Err(malformed());
                };
                match line.as_bytes().first() {
                    Some(b'+') => current.insertions += 1,
                    Some(b'-') => current.deletions += 1,
                    Some(b' ' | b'\\') | None => {}
                    Some(b'@') if line.starts_with("@@") => {}
                    Some(_) => return Err(malformed()),
                }
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATCH: &str = "\
diff --git a/src/lib.rs b/src/lib.rs
index 1111111..2222222 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,3 +1,4 @@
 fn a() {}
-fn b() {}
+fn b() -> u8 { 0 }
+fn c() {}
 fn d() {}
@@ -10,2 +11,1 @@
-// gone
 // kept
diff --git a/README b/README
new file mode 100644
--- /dev/null
+++ b/README
@@ -0,0 +1,1 @@
+hello
";

    #[test]
    fn counts_lines_per_file() {
        let stats = stats(PATCH).unwrap();
        assert_eq!(
            stats,
            vec![
                DiffStat {
                    path: "src/lib.rs".into(),
                    insertions: 2,
                    deletions: 2,
                },
                DiffStat {
                    path: "README".into(),
                    insertions: 1,
                    deletions: 0,
                },
            ]
        );
    }

    #[test]
    fn header_lines_are_not_counted() {
        let stats = stats("diff --git a/x b/x\n--- a/x\n+++ b/x\n").unwrap();
        assert_eq!(stats[0].insertions, 0);
        assert_eq!(stats[0].deletions, 0);
    }

    #[test]
    fn binary_section_has_no_counts() {
        let stats = stats("diff --git a/logo.png b/logo.png\nBinary files a/logo.png and b/logo.png differ\n").unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].path, "logo.png");
    }

    #[test]
    fn renamed_file_reports_new_path() {
        assert_eq!(parse_header("diff --git a/old name b/new name"), Some(("old name", "new name")));
    }

    #[test]
    fn path_containing_separator_is_split_in_the_middle() {
        assert_eq!(
            parse_header("diff --git a/x b/y b/x b/y"),
            Some(("x b/y", "x b/y"))
        );
        let stats = stats("diff --git a/x b/y b/x b/y\n--- a/x b/y\n+++ b/x b/y\n@@ -1 +1 @@\n-a\n+b\n")
            .unwrap();
        assert_eq!(stats[0].path, "x b/y");
        assert_eq!((stats[0].insertions, stats[0].deletions), (1, 1));
    }

    #[test]
    fn renamed_path_comes_from_the_new_file_line() {
        let stats = stats("diff --git a/a b/c b/d\n--- a/a b/c\n+++ b/d\n@@ -1 +1 @@\n-a\n+b\n")
            .unwrap();
        assert_eq!(stats[0].path, "d");
    }

    #[test]
    fn content_before_first_section_is_malformed() {
        let error = stats("+stray\n").unwrap_err();
        assert!(matches!(error, BackendError::Malformed { line: 1, .. }));
    }

    #[test]
    fn unknown_hunk_line_is_malformed() {
        let error = stats("diff --git a/x b/x\n@@ -1 +1 @@\n?what\n").unwrap_err();
        assert!(matches!(error, BackendError::Malformed { line: 3, .. }));
    }

    #[test]
    fn broken_header_is_malformed() {
        assert!(stats("diff --git x y\n").is_err());
    }

    #[test]
    fn empty_patch_has_no_stats() {
        assert!(stats("").unwrap().is_empty());
    }
}
