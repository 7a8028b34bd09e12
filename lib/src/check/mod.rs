//! Document integrity checks for markdown pages.
//!
//! A page is scanned once: front matter is split off and parsed, then the
//! body's markdown events are fed to every [`Rule`], which report
//! [`Diagnostic`]s when the scan is finished.

mod links;
mod code;
mod nav;

pub mod shell;

pub use links::References;
pub use code::ShellBlocks;
pub use nav::Navigation;

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pulldown_cmark::{BrokenLink, Event, Options, Parser};
use rayon::prelude::*;

use crate::config::Settings;
use crate::error::{Chainable, Result};
use crate::frontmatter::{self, FrontMatter, Split};
use crate::fstree::FsTree;
use crate::report::{Diagnostic, Report};
use crate::util::{line_of, normalize_label};

/// Every rule name a diagnostic can carry.
pub const RULES: &[&str] = &[
    frontmatter::UNTERMINATED,
    frontmatter::SYNTAX,
    frontmatter::DUPLICATE_KEY,
    frontmatter::TYPE,
    frontmatter::TITLE,
    links::UNDEFINED,
    links::UNUSED,
    code::SHELL_SYNTAX,
    nav::NAV_TARGET,
    nav::NAV_EMPTY,
    nav::NAV_UNCLOSED,
];

pub trait Rule {
    /// Observes one markdown event. `span` is relative to the page body.
    #[inline(always)]
    fn event(&mut self, _event: &Event<'_>, _span: Range<usize>) { }

    /// Reports findings once every event has been seen.
    fn finalize(&mut self, scan: &Scan<'_>, diagnostics: &mut Vec<Diagnostic>);
}

/// A link reference definition, `[label]: destination`.
#[derive(Debug, Clone)]
pub struct Definition {
    pub label: String,
    pub key: String,
    pub span: Range<usize>,
}

/// A reference-style link with no matching definition.
#[derive(Debug, Clone)]
pub struct BrokenRef {
    pub label: String,
    pub span: Range<usize>,
}

/// What a rule may know about the page being checked.
#[derive(Debug)]
pub struct Scan<'a> {
    pub text: &'a str,
    pub body: usize,
    pub path: Option<&'a Path>,
    pub site: Option<&'a FsTree>,
    pub definitions: Vec<Definition>,
    pub broken: Vec<BrokenRef>,
}

impl Scan<'_> {
    /// The document line of a body offset.
    pub fn line(&self, offset: usize) -> usize {
        line_of(self.text, self.body + offset)
    }

    /// Returns `true` if `path` names an existing file or directory.
    pub fn exists(&self, path: &Path) -> bool {
        match self.site {
            Some(tree) => tree.contains(path),
            None => path.exists(),
        }
    }
}

/// The markdown extensions pages are parsed with.
pub fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

/// A page to check: its text and, when it lives on disk, where.
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    pub text: &'a str,
    pub path: Option<&'a Path>,
    pub site: Option<&'a FsTree>,
}

impl<'a> Page<'a> {
    pub fn new(text: &'a str) -> Self {
        Page { text, path: None, site: None }
    }

    pub fn at(mut self, path: &'a Path, site: &'a FsTree) -> Self {
        self.path = Some(path);
        self.site = Some(site);
        self
    }

    /// Runs every enabled rule over the page.
    pub fn check(&self, settings: &Settings) -> Vec<Diagnostic> {
        let mut diagnostics = vec![];
        let (front_matter, body) = self.front_matter(&mut diagnostics);
        if let Some(front_matter) = &front_matter {
            front_matter.validate(1, &mut diagnostics);
        }

        let mut references = References::default();
        let mut shell_blocks = ShellBlocks::default();
        let mut navigation = Navigation::default();
        let mut rules: [&mut dyn Rule; 3] = [&mut references, &mut shell_blocks, &mut navigation];

        let input = &self.text[body..];
        let mut broken = vec![];
        let mut on_broken = |link: BrokenLink<'_>| {
            broken.push(BrokenRef { label: link.reference.to_string(), span: link.span });
            None
        };

        let parser = Parser::new_with_broken_link_callback(input, options(), Some(&mut on_broken));
        let mut definitions: Vec<_> = parser.reference_definitions()
            .iter()
            .map(|(label, def)| Definition {
                label: label.to_string(),
                key: normalize_label(label),
                span: def.span.clone(),
            })
            .collect();

        definitions.sort_by_key(|d| d.span.start);
        for (event, span) in parser.into_offset_iter() {
            for rule in rules.iter_mut() {
                rule.event(&event, span.clone());
            }
        }

        let scan = Scan {
            text: self.text,
            body,
            path: self.path,
            site: self.site,
            definitions,
            broken,
        };

        for rule in rules.iter_mut() {
            rule.finalize(&scan, &mut diagnostics);
        }

        let path: Option<Arc<Path>> = self.path.map(Arc::from);
        diagnostics.retain(|d| settings.is_enabled(d.rule));
        diagnostics.iter_mut().for_each(|d| d.path = path.clone());
        diagnostics.sort_by_key(|d| d.line);
        diagnostics
    }

    /// Splits off and parses the front matter. Returns it along with the
    /// offset of the body.
    fn front_matter(&self, diagnostics: &mut Vec<Diagnostic>) -> (Option<FrontMatter>, usize) {
        match frontmatter::split(self.text) {
            Split::None => (None, 0),
            Split::Unterminated => {
                diagnostics.push(Diagnostic::error(frontmatter::UNTERMINATED, 1,
                    "front matter opened with `---` is never closed"));

                (None, 0)
            }
            Split::Block { lines, body } => {
                let first_line = line_of(self.text, lines.start);
                let block = &self.text[lines];
                (Some(FrontMatter::parse(block, first_line, diagnostics)), body)
            }
        }
    }
}

/// Checks every markdown page at or below each of `paths`.
pub fn check_paths<P: AsRef<Path> + Sync>(paths: &[P], settings: &Settings) -> Result<Report> {
    let mut diagnostics = vec![];
    for root in paths {
        let root = root.as_ref();
        let tree = FsTree::build(root).chain_with(|| error! {
            "failed to discover pages",
            "path" => root.display(),
        })?;

        let pages: Vec<PathBuf> = tree.pages().map(|e| e.path.to_path_buf()).collect();
        tracing::info!(root = %root.display(), pages = pages.len(), "checking pages");

        let found = pages.par_iter()
            .map(|path| check_file(path, &tree, settings))
            .collect::<Result<Vec<_>>>()?;

        diagnostics.extend(found.into_iter().flatten());
    }

    Ok(Report::new(diagnostics))
}

fn check_file(path: &Path, tree: &FsTree, settings: &Settings) -> Result<Vec<Diagnostic>> {
    let text = fs::read_to_string(path).chain_with(|| error! {
        "failed to read page",
        "path" => path.display(),
    })?;

    let diagnostics = Page::new(&text).at(path, tree).check(settings);
    tracing::debug!(path = %path.display(), found = diagnostics.len(), "checked page");
    Ok(diagnostics)
}
