use std::ops::Range;

use pulldown_cmark::{Event, LinkType, Tag};
use rustc_hash::FxHashSet;

use crate::check::{Rule, Scan};
use crate::report::Diagnostic;
use crate::util::normalize_label;

pub const UNDEFINED: &str = "undefined-reference";
pub const UNUSED: &str = "unused-definition";

/// Matches reference-style links against link reference definitions.
#[derive(Debug, Default)]
pub struct References {
    used: FxHashSet<String>,
}

impl Rule for References {
    fn event(&mut self, event: &Event<'_>, _: Range<usize>) {
        let (Event::Start(Tag::Link { link_type, id, .. })
            | Event::Start(Tag::Image { link_type, id, .. })) = event else {
            return;
        };

        if matches!(link_type, LinkType::Reference | LinkType::Collapsed | LinkType::Shortcut) {
            self.used.insert(normalize_label(id));
        }
    }

    fn finalize(&mut self, scan: &Scan<'_>, diagnostics: &mut Vec<Diagnostic>) {
        for broken in &scan.broken {
            diagnostics.push(Diagnostic::error(UNDEFINED, scan.line(broken.span.start),
                format!("no definition for reference `[{}]`", broken.label)));
        }

        for definition in &scan.definitions {
            if !self.used.contains(&definition.key) {
                diagnostics.push(Diagnostic::warning(UNUSED, scan.line(definition.span.start),
                    format!("link definition `[{}]` is never used", definition.label)));
            }
        }
    }
}
