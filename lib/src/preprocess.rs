use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::frontmatter::{self, Split};

/// `title: 1. Something`, optionally quoted.
static NUMBERED_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^(title[ \t]*:[ \t]*["']?)(\d+)\. "#).unwrap()
});

/// Rewrites a numbered front matter title, `1. Title`, as `1// Title`.
///
/// Pandoc renders a title that starts with a number and a period as a list
/// item. The postprocessor turns `1// ` back into `1. ` in the rendered HTML.
/// Text outside the front matter is returned untouched.
///
/// ```
/// use bassclef::preprocess::preprocess;
///
/// let page = "---\ntitle: 2. Installation\n---\n1. Download\n";
/// assert_eq!(preprocess(page), "---\ntitle: 2// Installation\n---\n1. Download\n");
/// ```
pub fn preprocess(text: &str) -> Cow<'_, str> {
    let Split::Block { lines, .. } = frontmatter::split(text) else {
        return Cow::Borrowed(text);
    };

    match NUMBERED_TITLE.replace(&text[lines.clone()], "${1}${2}// ") {
        Cow::Borrowed(_) => Cow::Borrowed(text),
        Cow::Owned(block) => {
            let mut output = String::with_capacity(text.len() + 1);
            output.push_str(&text[..lines.start]);
            output.push_str(&block);
            output.push_str(&text[lines.end..]);
            Cow::Owned(output)
        }
    }
}
