//! Page rendering.
//!
//! Everything here is a pure function from already fetched data to HTML. Links
//! are relative so the site can be served from any prefix; pages under
//! `commits/<id>/` sit two levels below the root.

use std::collections::HashSet;

use build_html::{
    Container, ContainerType, Html as _, HtmlContainer as _, HtmlPage, Table, TableCell, TableRow,
    escape_html,
};
use gix_date::time::format::ISO8601;

use crate::backend::{Commit, DiffStat, FileEntry, Signature, short_id};
use crate::html::{self, Bold, anchor, link, url_path};
use crate::patch;

const COMMIT_ROOT: &str = "../../";

pub fn format_time(seconds: i64) -> String {
    gix_date::Time::new(seconds, 0).format(ISO8601)
}

/// `N files changed, I insertions(+), D deletions(-)`
pub fn summary(stats: &[DiffStat]) -> String {
    let insertions: usize = stats.iter().map(|s| s.insertions).sum();
    let deletions: usize = stats.iter().map(|s| s.deletions).sum();
    format!(
        "{} files changed, {} insertions(+), {} deletions(-)",
        stats.len(),
        insertions,
        deletions
    )
}

fn signature(signature: &Signature) -> String {
    escape_html(&format!("{} <{}>", signature.name, signature.email))
}

fn field(label: &str, value: &str) -> String {
    format!("{} {}\n", Bold::from(label).to_html_string(), value)
}

fn header(project: &str, root: &str) -> Container {
    Container::new(ContainerType::Div)
        .with_attributes([("id", "header")])
        .with_header(1, link(&format!("{root}index.html"), project))
}

/// A self-contained page for one blob, each line prefixed with its 1-based
/// number. Content that is not UTF-8 is only described, not shown.
pub fn blob_page(hash: &str, data: &[u8]) -> String {
    let mut content = Container::new(ContainerType::Div)
        .with_attributes([("id", "content")])
        .with_paragraph(format!("{} ({}B)", hash, data.len()))
        .with_raw("<hr/>");
    match std::str::from_utf8(data) {
        Ok(text) => {
            let lines: Vec<String> = text
                .lines()
                .enumerate()
                .map(|(i, line)| format!("{}{}", html::line_number(i + 1), escape_html(line)))
                .collect();
            content.add_preformatted_attr(&lines.join("\n"), [("id", "blob")]);
        }
        Err(_) => content.add_paragraph(format!("binary file ({} bytes)", data.len())),
    }
    HtmlPage::new()
        .with_title(hash)
        .with_container(content)
        .to_html_string()
}

#[derive(Debug, PartialEq, Eq)]
pub enum TreeEvent<'a> {
    /// A directory starts, carrying its full path.
    Open(String),
    Leaf(&'a FileEntry),
    Close,
}

/// Nesting events for a path sorted listing. Directories are opened and closed
/// exactly once per boundary crossing by keeping a stack of open components.
pub fn tree_events(files: &[FileEntry]) -> Vec<TreeEvent<'_>> {
    let mut open: Vec<&str> = Vec::new();
    let mut events = Vec::new();
    for entry in files {
        let dirs: Vec<&str> = match entry.path.rsplit_once('/') {
            Some((dir, _)) => dir.split('/').collect(),
            None => Vec::new(),
        };
        let common = open
            .iter()
            .zip(&dirs)
            .take_while(|(open, dir)| open == dir)
            .count();
        while open.len() > common {
            open.pop();
            events.push(TreeEvent::Close);
        }
        for &dir in &dirs[common..] {
            open.push(dir);
            events.push(TreeEvent::Open(open.join("/")));
        }
        events.push(TreeEvent::Leaf(entry));
    }
    events.extend(open.iter().map(|_| TreeEvent::Close));
    events
}

pub fn tree_html(files: &[FileEntry]) -> String {
    let mut out = String::from("<ul class=\"tree\">\n");
    for event in tree_events(files) {
        match event {
            TreeEvent::Open(dir) => {
                let name = dir.rsplit('/').next().unwrap_or(&dir);
                out.push_str(&format!(
                    "<li class=\"dir\">{}/\n<ul>\n",
                    escape_html(name)
                ));
            }
            TreeEvent::Leaf(entry) => {
                let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
                out.push_str(&format!(
                    "<li><a id=\"{}\" href=\"{}.raw.html\">{}</a></li>\n",
                    anchor(&entry.path),
                    url_path(&entry.path),
                    escape_html(name)
                ));
            }
            TreeEvent::Close => out.push_str("</ul>\n</li>\n"),
        }
    }
    out.push_str("</ul>\n");
    out
}

/// What the commit page shows about one parent.
#[derive(Debug, Clone)]
pub struct ParentDiff {
    pub id: String,
    pub stats: Vec<DiffStat>,
    /// Paths present in the parent's tree.
    pub paths: HashSet<String>,
}

#[derive(Debug)]
pub struct CommitPage<'a> {
    pub project: &'a str,
    pub branch: &'a str,
    pub commit: &'a Commit,
    pub parents: &'a [ParentDiff],
    pub files: &'a [FileEntry],
}

fn diffstat_table(parent: &ParentDiff, files: &HashSet<&str>) -> Table {
    let mut table = Table::new()
        .with_attributes([("class", "diffstat")])
        .with_header_row(["File", "In parent", "Diff", "+", "-"]);
    for stat in &parent.stats {
        let href = url_path(&stat.path);
        let file = if files.contains(stat.path.as_str()) {
            link(&format!("{href}.raw.html"), &stat.path)
        } else {
            escape_html(&stat.path)
        };
        let in_parent = if parent.paths.contains(&stat.path) {
            link(
                &format!("../{}/{href}.raw.html", parent.id),
                short_id(&parent.id),
            )
        } else {
            String::new()
        };
        let diff = link(
            &format!("diff-to-{}.html#{}", parent.id, anchor(&stat.path)),
            "diff",
        );
        table.add_custom_body_row(
            TableRow::new()
                .with_cell(TableCell::default().with_raw(file))
                .with_cell(TableCell::default().with_raw(in_parent))
                .with_cell(TableCell::default().with_raw(diff))
                .with_cell(
                    TableCell::default()
                        .with_attributes([("class", "num")])
                        .with_raw(format!("+{}", stat.insertions)),
                )
                .with_cell(
                    TableCell::default()
                        .with_attributes([("class", "num")])
                        .with_raw(format!("-{}", stat.deletions)),
                ),
        );
    }
    table
}

/// `commits/<id>/index.html`
pub fn commit_index(page: &CommitPage<'_>) -> String {
    let commit = page.commit;
    let mut meta = field("commit", &commit.id);
    meta += &field(
        "branch",
        &link(
            &format!("{COMMIT_ROOT}branches/{}.html", url_path(page.branch)),
            page.branch,
        ),
    );
    for parent in &commit.parents {
        meta += &field(
            "parent",
            &format!(
                "{} ({})",
                link(&format!("../{parent}/index.html"), parent),
                link(&format!("diff-to-{parent}.html"), "diff")
            ),
        );
    }
    meta += &field("author", &signature(&commit.author));
    meta += &field("committer", &signature(&commit.committer));
    meta += &field("date", &format_time(commit.time));

    let mut content = Container::new(ContainerType::Div).with_attributes([("id", "content")]);
    content.add_preformatted(meta);
    content.add_preformatted_attr(escape_html(&commit.message), [("class", "message")]);

    let files: HashSet<&str> = page.files.iter().map(|f| f.path.as_str()).collect();
    for parent in page.parents {
        content.add_header(
            2,
            format!(
                "Changes from {}",
                link(&format!("diff-to-{}.html", parent.id), short_id(&parent.id))
            ),
        );
        content.add_paragraph(summary(&parent.stats));
        content.add_table(diffstat_table(parent, &files));
    }

    content.add_header(2, "Files");
    content.add_raw(tree_html(page.files));

    let container = header(page.project, COMMIT_ROOT).with_container(content);
    html::document(
        &format!("{} - {}", commit.summary, page.project),
        COMMIT_ROOT,
        container,
    )
}

/// `section` is the stat of the file whose `diff --git` header `line` is, its
/// path names the anchor so diffstat links always land on their section.
fn diff_line(line: &str, section: Option<&DiffStat>) -> String {
    let path = section
        .map(|stat| stat.path.as_str())
        .or_else(|| patch::parse_header(line).map(|(_, new)| new));
    if let Some(path) = path {
        return format!("<a id=\"{}\">{}</a>", anchor(path), escape_html(line));
    }
    let class = match line.as_bytes().first() {
        Some(b'+') => "i",
        Some(b'-') => "d",
        Some(b'@') => "h",
        _ => return escape_html(line),
    };
    format!("<span class=\"{class}\">{}</span>", escape_html(line))
}

/// `commits/<id>/diff-to-<parent>.html`
pub fn diff_page(
    project: &str,
    commit: &Commit,
    parent: &str,
    diff: &str,
    stats: &[DiffStat],
) -> String {
    let mut content = Container::new(ContainerType::Div).with_attributes([("id", "content")]);
    content.add_header(
        2,
        format!(
            "diff {}..{}",
            link(&format!("../{parent}/index.html"), short_id(parent)),
            link("index.html", commit.short_id())
        ),
    );
    content.add_paragraph(summary(stats));
    let mut sections = stats.iter();
    let lines: Vec<String> = diff
        .lines()
        .enumerate()
        .map(|(i, line)| {
            let section = if line.starts_with("diff --git ") {
                sections.next()
            } else {
                None
            };
            format!("{}{}", html::line_number(i + 1), diff_line(line, section))
        })
        .collect();
    content.add_preformatted_attr(&lines.join("\n"), [("id", "diff")]);

    let container = header(project, COMMIT_ROOT).with_container(content);
    html::document(
        &format!(
            "diff {}..{} - {}",
            short_id(parent),
            commit.short_id(),
            project
        ),
        COMMIT_ROOT,
        container,
    )
}

/// Row of a branch page for a commit. `root` leads from the branch page back
/// to the site root.
pub fn branch_row(root: &str, glyphs: &str, commit: &Commit) -> TableRow {
    let href = format!("{root}commits/{}/index.html", commit.id);
    TableRow::new()
        .with_cell(
            TableCell::default()
                .with_attributes([("class", "graph")])
                .with_raw(glyphs),
        )
        .with_cell(TableCell::default().with_raw(link(&href, commit.short_id())))
        .with_cell(TableCell::default().with_raw(link(&href, &commit.summary)))
        .with_cell(TableCell::default().with_raw(escape_html(&commit.committer.name)))
        .with_cell(TableCell::default().with_raw(format_time(commit.time)))
}

/// Row of a branch page carrying graph edges only.
pub fn decoration_row(glyphs: &str) -> TableRow {
    TableRow::new()
        .with_cell(
            TableCell::default()
                .with_attributes([("class", "graph")])
                .with_raw(glyphs),
        )
        .with_cell(TableCell::default().with_raw(""))
        .with_cell(TableCell::default().with_raw(""))
        .with_cell(TableCell::default().with_raw(""))
        .with_cell(TableCell::default().with_raw(""))
}

/// `branches/<branch>.html`
pub fn branch_page(project: &str, branch: &str, root: &str, rows: Vec<TableRow>) -> String {
    let mut table = Table::new()
        .with_attributes([("id", "log")])
        .with_header_row(["Graph", "Commit", "Message", "Committer", "Date"]);
    for row in rows {
        table.add_custom_body_row(row);
    }
    let mut content = Container::new(ContainerType::Div).with_attributes([("id", "content")]);
    content.add_header(2, escape_html(branch));
    content.add_table(table);

    let container = header(project, root).with_container(content);
    html::document(&format!("{branch} - {project}"), root, container)
}

/// Row of the top-level index for a branch and its head commit.
pub fn index_row(branch: &str, head: &Commit) -> TableRow {
    let branch_href = url_path(branch);
    TableRow::new()
        .with_cell(TableCell::default().with_raw(link(
            &format!("branches/{branch_href}.html"),
            branch,
        )))
        .with_cell(TableCell::default().with_raw(link(
            &format!("branches/{branch_href}/index.html"),
            &head.summary,
        )))
        .with_cell(TableCell::default().with_raw(escape_html(&head.committer.name)))
        .with_cell(TableCell::default().with_raw(format_time(head.time)))
}

/// `index.html`
pub fn index_page(project: &str, clone_url: Option<&str>, rows: Vec<TableRow>) -> String {
    let mut content = Container::new(ContainerType::Div).with_attributes([("id", "content")]);
    if let Some(url) = clone_url {
        content.add_preformatted(escape_html(&format!("git clone {url}")));
    }
    let mut table = Table::new()
        .with_attributes([("id", "branches")])
        .with_header_row(["Branch", "Last commit", "Committer", "Date"]);
    for row in rows {
        table.add_custom_body_row(row);
    }
    content.add_header(2, "Branches");
    content.add_table(table);

    let container = header(project, "").with_container(content);
    html::document(project, "", container)
}
