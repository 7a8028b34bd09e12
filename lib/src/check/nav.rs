use std::ops::Range;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use pulldown_cmark::Event;
use regex::Regex;

use crate::check::{Rule, Scan};
use crate::report::Diagnostic;
use crate::util::normalize_path;

pub const NAV_TARGET: &str = "nav-target";
pub const NAV_EMPTY: &str = "nav-empty";
pub const NAV_UNCLOSED: &str = "nav-unclosed";

static NAV_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<nav[\s>]").unwrap());
static HREF: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<a\s[^>]*?href="([^"]*)""#).unwrap());

/// Collects `<nav>` blocks and checks that their local links resolve.
#[derive(Debug, Default)]
pub struct Navigation {
    open: Option<(usize, String)>,
    blocks: Vec<(usize, String)>,
}

impl Navigation {
    fn html(&mut self, html: &str, span: Range<usize>) {
        let (start, mut html) = match self.open.take() {
            Some((start, mut open)) => {
                open.push_str(html);
                (start, open)
            }
            None => match NAV_OPEN.find(html) {
                Some(m) => (span.start, html[m.start()..].to_string()),
                None => return,
            },
        };

        match html.find("</nav>") {
            Some(i) => {
                html.truncate(i + "</nav>".len());
                self.blocks.push((start, html));
            }
            None => self.open = Some((start, html)),
        }
    }
}

impl Rule for Navigation {
    fn event(&mut self, event: &Event<'_>, span: Range<usize>) {
        if let Event::Html(html) | Event::InlineHtml(html) = event {
            self.html(html, span);
        }
    }

    fn finalize(&mut self, scan: &Scan<'_>, diagnostics: &mut Vec<Diagnostic>) {
        if let Some((start, _)) = &self.open {
            diagnostics.push(Diagnostic::error(NAV_UNCLOSED, scan.line(*start), "`<nav>` is never closed"));
        }

        for (start, html) in &self.blocks {
            let first_line = scan.line(*start);
            let mut links = HREF.captures_iter(html).peekable();
            if links.peek().is_none() {
                diagnostics.push(Diagnostic::warning(NAV_EMPTY, first_line, "`<nav>` has no links"));
                continue;
            }

            for captures in links {
                let href = &captures[1];
                let Some(target) = local_target(href) else { continue };
                if !resolves(scan, target) {
                    let offset = captures.get(0).map_or(0, |m| m.start());
                    let line = first_line + html[..offset].matches('\n').count();
                    diagnostics.push(Diagnostic::error(NAV_TARGET, line,
                        format!("navigation link `{href}` does not resolve to a page")));
                }
            }
        }
    }
}

/// The path part of `href` if it points inside the site.
fn local_target(href: &str) -> Option<&str> {
    let remote = href.contains("://")
        || href.starts_with("//")
        || href.starts_with('#')
        || ["mailto:", "tel:", "javascript:"].iter().any(|s| href.starts_with(s));

    if remote {
        return None;
    }

    let path = href.split(['#', '?']).next().unwrap_or("");
    (!path.is_empty()).then_some(path)
}

/// Returns `true` if `target` names an existing page or file. Pages known
/// only by text (no path) cannot be resolved and are taken on trust.
fn resolves(scan: &Scan<'_>, target: &str) -> bool {
    let Some(path) = scan.path else {
        return true;
    };

    let page_dir = path.parent().unwrap_or(Path::new(""));
    let base: PathBuf = match (target.starts_with('/'), scan.site) {
        (true, Some(site)) if site.root().file_type.is_dir() => site.root().path.to_path_buf(),
        _ => page_dir.to_path_buf(),
    };

    let candidate = normalize_path(base.join(target.trim_start_matches('/')));
    let mut candidates = vec![candidate.clone()];
    if target.ends_with('/') {
        candidates.push(candidate.join("index.md"));
        candidates.push(candidate.join("index.html"));
    } else if candidate.extension().map_or(false, |ext| ext == "html") {
        candidates.push(candidate.with_extension("md"));
    }

    candidates.iter().any(|c| scan.exists(c))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::check::Page;
    use crate::config::Settings;
    use crate::fstree::FsTree;

    #[test]
    fn remote_and_anchor_links_are_skipped() {
        assert_eq!(local_target("https://github.com/tomduck/bassclef"), None);
        assert_eq!(local_target("#top"), None);
        assert_eq!(local_target("mailto:someone@example.com"), None);
        assert_eq!(local_target("index.html#install"), Some("index.html"));
        assert_eq!(local_target("../docs/?page=2"), Some("../docs/"));
    }

    #[test]
    fn nav_blocks_are_collected() {
        let text = "Text.\n\n<nav>\n<a href=\"a.html\">A</a>\n<a class=\"x\" href=\"b.html\">B</a>\n</nav>\n\n<nav></nav>\n";
        let mut nav = Navigation::default();
        let parser = pulldown_cmark::Parser::new(text);
        for (event, span) in parser.into_offset_iter() {
            nav.event(&event, span);
        }

        assert_eq!(nav.blocks.len(), 2);
        let hrefs: Vec<_> = HREF.captures_iter(&nav.blocks[0].1).map(|c| c[1].to_string()).collect();
        assert_eq!(hrefs, ["a.html", "b.html"]);

        let diagnostics = Page::new(text).check(&Settings::default());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!((diagnostics[0].line, diagnostics[0].rule), (8, NAV_EMPTY));
    }

    #[test]
    fn unclosed_nav_is_reported() {
        let text = "Text.\n\n<nav>\n<a href=\"a.html\">A</a>\n\nMore text.\n";
        let diagnostics = Page::new(text).check(&Settings::default());
        let found: Vec<_> = diagnostics.iter().map(|d| (d.line, d.rule, d.message.as_str())).collect();
        assert_eq!(found, [(3, NAV_UNCLOSED, "`<nav>` is never closed")]);
    }

    #[test]
    fn targets_resolve_against_the_site() {
        let dir = tempfile::Builder::new().prefix("site").tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(docs.join("guide")).unwrap();
        fs::write(docs.join("index.md"), "").unwrap();
        fs::write(docs.join("guide/index.md"), "").unwrap();
        fs::write(docs.join("style.css"), "").unwrap();

        let page = "<nav>\n<a href=\"index.html\">Index</a>\n<a href=\"../guide/\">Guide</a>\n\
            <a href=\"/style.css\">Style</a>\n<a href=\"https://pandoc.org/\">Pandoc</a>\n\
            <a href=\"../index.html\">Up</a>\n<a href=\"missing.html\">Missing</a>\n</nav>\n";

        let path = docs.join("guide/index.md");
        fs::write(&path, page).unwrap();
        let tree = FsTree::build(&docs).unwrap();

        let diagnostics = Page::new(page).at(&path, &tree).check(&Settings::default());
        let found: Vec<_> = diagnostics.iter().map(|d| (d.line, d.message.as_str())).collect();
        assert_eq!(found, [(7, "navigation link `missing.html` does not resolve to a page")]);
    }
}
