use std::fmt::Display;

use build_html::{Container, Html, HtmlContainer as _, HtmlElement, HtmlPage, escape_html};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

#[derive(Debug)]
pub struct Bold {
    content: String,
}

impl Html for Bold {
    fn to_html_string(&self) -> String {
        format!("<b>{}</b>", escape_html(&self.content))
    }
}

impl<T: Display> From<T> for Bold {
    fn from(value: T) -> Self {
        Bold {
            content: value.to_string(),
        }
    }
}

/// Anchor id shared by a file's entry in the tree and its section in a diff.
pub fn anchor(path: &str) -> String {
    format!("file-{}", url_path(path))
}

/// Bytes escaped in paths used as `href` or `id`. Non-ASCII is always escaped,
/// `/` is kept so paths stay relative links.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub fn url_path(path: &str) -> String {
    utf8_percent_encode(path, PATH).to_string()
}

pub fn link(href: &str, text: &str) -> String {
    HtmlElement::new(build_html::HtmlTag::Link)
        .with_attribute("href", href)
        .with_raw(escape_html(text))
        .to_html_string()
}

/// The numbered gutter link in front of line `n` (1-based).
pub fn line_number(n: usize) -> String {
    HtmlElement::new(build_html::HtmlTag::Link)
        .with_attribute("id", format!("l{n}"))
        .with_attribute("href", format!("#l{n}"))
        .with_attribute("class", "line")
        .with_raw(format!("{n: >7} "))
        .to_html_string()
}

/// Relative prefix leading from `path` (relative to the site root) back to
/// the root, e.g. `commits/abc/index.html` gives `../../`.
pub fn to_root(path: &str) -> String {
    "../".repeat(path.matches('/').count())
}

/// Wraps page content in the document shell shared by every site page.
pub fn document(title: &str, root: &str, container: Container) -> String {
    HtmlPage::new()
        .with_title(escape_html(title))
        .with_stylesheet(format!("{root}style.css"))
        .with_container(container)
        .to_html_string()
}
