//! HTML checking and whitespace collapsing.
//!
//! Both operate on a flat token stream; there is no DOM. Content of
//! `script`, `style` and `textarea` is taken verbatim up to the matching
//! end tag.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^<(/?)([A-Za-z][A-Za-z0-9:-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
        .expect("tag pattern is valid")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([^\s"'=/>]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("attribute pattern is valid")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose end tag may be omitted.
const OPTIONAL_END: &[&str] = &[
    "html", "head", "body", "p", "li", "dt", "dd", "option", "optgroup", "tr", "td", "th",
    "thead", "tbody", "tfoot", "colgroup", "caption", "rp", "rt",
];

const RAW_TEXT: &[&str] = &["script", "style", "textarea"];

/// Elements around which whitespace carries no rendering meaning.
const BLOCK_ELEMENTS: &[&str] = &[
    "html", "head", "body", "title", "meta", "link", "script", "style", "base", "noscript",
    "template", "div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "dl", "dt",
    "dd", "table", "thead", "tbody", "tfoot", "tr", "td", "th", "caption", "colgroup", "col",
    "section", "article", "header", "footer", "nav", "main", "aside", "form", "fieldset",
    "legend", "figure", "figcaption", "blockquote", "pre", "hr", "address", "details",
    "summary", "option", "optgroup", "iframe", "video", "audio", "canvas", "source", "track",
];

/// A problem found by [`validate_html`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlIssue {
    /// 1-based line number
    pub line: usize,

    /// Human readable description
    pub message: String,
}

impl HtmlIssue {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for HtmlIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

#[derive(Debug)]
struct Tag<'a> {
    name: String,
    attrs: &'a str,
    self_closing: bool,
}

#[derive(Debug)]
enum Token<'a> {
    Text(&'a str),
    Comment(&'a str),
    Declaration(&'a str),
    Start(Tag<'a>, &'a str),
    End(String, &'a str),
    Raw(&'a str),
}

#[derive(Debug)]
struct Spanned<'a> {
    offset: usize,
    token: Token<'a>,
}

fn tokenize(src: &str) -> Vec<Spanned<'_>> {
    let lower = src.to_ascii_lowercase();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < src.len() {
        let rest = &src[pos..];
        let offset = pos;

        if rest.starts_with("<!--") {
            let end = rest.find("-->").map(|i| i + 3).unwrap_or(rest.len());
            tokens.push(Spanned {
                offset,
                token: Token::Comment(&rest[..end]),
            });
            pos += end;
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            let end = rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
            tokens.push(Spanned {
                offset,
                token: Token::Declaration(&rest[..end]),
            });
            pos += end;
        } else if let Some(caps) = TAG_RE.captures(rest) {
            let raw = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let name = caps[2].to_ascii_lowercase();
            pos += raw.len();

            if &caps[1] == "/" {
                tokens.push(Spanned {
                    offset,
                    token: Token::End(name, raw),
                });
                continue;
            }

            let attrs = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
            let self_closing = attrs.trim_end().ends_with('/');
            let raw_text = RAW_TEXT.contains(&name.as_str()) && !self_closing;
            let closing = format!("</{}", name);

            tokens.push(Spanned {
                offset,
                token: Token::Start(
                    Tag {
                        name,
                        attrs,
                        self_closing,
                    },
                    raw,
                ),
            });

            if raw_text {
                let end = lower[pos..]
                    .find(&closing)
                    .map(|i| pos + i)
                    .unwrap_or(src.len());
                if end > pos {
                    tokens.push(Spanned {
                        offset: pos,
                        token: Token::Raw(&src[pos..end]),
                    });
                }
                pos = end;
            }
        } else {
            let skip = usize::from(rest.starts_with('<'));
            let end = rest[skip..]
                .find('<')
                .map(|i| i + skip)
                .unwrap_or(rest.len());
            tokens.push(Spanned {
                offset,
                token: Token::Text(&rest[..end]),
            });
            pos += end;
        }
    }

    tokens
}

/// Look up an attribute. Attributes without a value yield `""`.
fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    ATTR_RE.captures_iter(attrs).find_map(|caps| {
        if !caps[1].eq_ignore_ascii_case(name) {
            return None;
        }
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
            .unwrap_or("");
        Some(value)
    })
}

/// Line numbers for token offsets, which only ever increase.
struct LineCounter<'a> {
    src: &'a str,
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            offset: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, offset: usize) -> usize {
        if offset > self.offset {
            self.line += self.src[self.offset..offset].matches('\n').count();
            self.offset = offset;
        }
        self.line
    }
}

/// Check an HTML document for common authoring mistakes.
///
/// Reports a missing doctype, `<html>` without `lang`, a missing `<title>`,
/// unclosed or stray tags, duplicate ids and images without `alt`.
pub fn validate_html(src: &str) -> Vec<HtmlIssue> {
    let tokens = tokenize(src);
    let mut issues = Vec::new();
    let mut stack: Vec<(String, usize)> = Vec::new();
    let mut ids: HashMap<String, usize> = HashMap::new();
    let mut seen_doctype = false;
    let mut seen_content = false;
    let mut seen_title = false;
    let mut lines = LineCounter::new(src);

    for spanned in &tokens {
        let line = lines.line_at(spanned.offset);

        match &spanned.token {
            Token::Declaration(raw) => {
                if raw.get(..9).is_some_and(|d| d.eq_ignore_ascii_case("<!doctype")) {
                    if seen_content {
                        issues.push(HtmlIssue::new(line, "Doctype must come first"));
                    }
                    seen_doctype = true;
                }
            }
            Token::Comment(_) => {}
            Token::Text(text) => {
                if !text.trim().is_empty() {
                    seen_content = true;
                }
            }
            Token::Raw(_) => {}
            Token::Start(tag, _) => {
                seen_content = true;
                let name = tag.name.as_str();

                match name {
                    "html" if attribute(tag.attrs, "lang").is_none_or(str::is_empty) => {
                        issues.push(HtmlIssue::new(
                            line,
                            "<html> element is missing a lang attribute",
                        ));
                    }
                    "title" => seen_title = true,
                    "img" if attribute(tag.attrs, "alt").is_none() => {
                        issues.push(HtmlIssue::new(
                            line,
                            "<img> element is missing an alt attribute",
                        ));
                    }
                    _ => {}
                }

                if let Some(id) = attribute(tag.attrs, "id") {
                    if let Some(first) = ids.get(id) {
                        issues.push(HtmlIssue::new(
                            line,
                            format!("Duplicate id '{}' (first used on line {})", id, first),
                        ));
                    } else {
                        ids.insert(id.to_string(), line);
                    }
                }

                if VOID_ELEMENTS.contains(&name) {
                    continue;
                }
                if tag.self_closing {
                    issues.push(HtmlIssue::new(
                        line,
                        format!("Self-closing syntax on non-void element <{}>", name),
                    ));
                    continue;
                }

                stack.push((tag.name.clone(), line));
            }
            Token::End(name, _) => {
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    issues.push(HtmlIssue::new(line, format!("Stray end tag </{}>", name)));
                    continue;
                }

                match stack.iter().rposition(|(open, _)| open == name) {
                    Some(index) => {
                        for (open, open_line) in stack.drain(index..).skip(1) {
                            if !OPTIONAL_END.contains(&open.as_str()) {
                                issues.push(HtmlIssue::new(
                                    open_line,
                                    format!("Unclosed element <{}> before </{}>", open, name),
                                ));
                            }
                        }
                    }
                    None => {
                        issues.push(HtmlIssue::new(line, format!("Stray end tag </{}>", name)));
                    }
                }
            }
        }
    }

    for (open, open_line) in stack {
        if !OPTIONAL_END.contains(&open.as_str()) {
            issues.push(HtmlIssue::new(open_line, format!("Unclosed element <{}>", open)));
        }
    }

    if !seen_doctype {
        issues.insert(0, HtmlIssue::new(1, "Missing <!DOCTYPE html>"));
    }
    if !seen_title {
        issues.push(HtmlIssue::new(1, "Document has no <title> element"));
    }

    issues.sort_by_key(|issue| issue.line);
    issues
}

fn is_block(token: Option<&Spanned<'_>>) -> bool {
    match token.map(|s| &s.token) {
        None => true,
        Some(Token::Start(tag, _)) => BLOCK_ELEMENTS.contains(&tag.name.as_str()),
        Some(Token::End(name, _)) => BLOCK_ELEMENTS.contains(&name.as_str()),
        Some(Token::Declaration(_)) => true,
        _ => false,
    }
}

/// Collapse insignificant whitespace in an HTML document.
///
/// Runs of whitespace in text become a single space. Whitespace next to a
/// block-level tag is dropped. `pre`, `textarea`, `script` and `style`
/// content is left as written, and comments are kept.
pub fn collapse_whitespace(src: &str) -> String {
    let tokens = tokenize(src);
    let mut out = String::with_capacity(src.len());
    let mut pre_depth = 0usize;

    for (i, spanned) in tokens.iter().enumerate() {
        match &spanned.token {
            Token::Start(tag, raw) => {
                if tag.name == "pre" && !tag.self_closing {
                    pre_depth += 1;
                }
                out.push_str(raw);
            }
            Token::End(name, raw) => {
                if name == "pre" {
                    pre_depth = pre_depth.saturating_sub(1);
                }
                out.push_str(raw);
            }
            Token::Comment(raw) | Token::Declaration(raw) | Token::Raw(raw) => out.push_str(raw),
            Token::Text(text) if pre_depth > 0 => out.push_str(text),
            Token::Text(text) => {
                let prev = i.checked_sub(1).and_then(|p| tokens.get(p));
                let next = tokens.get(i + 1);
                let collapsed = WHITESPACE_RE.replace_all(text, " ");
                let mut collapsed = collapsed.as_ref();

                if is_block(prev) {
                    collapsed = collapsed.trim_start();
                }
                if is_block(next) {
                    collapsed = collapsed.trim_end();
                }
                out.push_str(collapsed);
            }
        }
    }

    out.trim().to_string()
}
