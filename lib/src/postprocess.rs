//! Line-by-line fixes and enhancements for the HTML pandoc produces.
//!
//! A [`Postprocessor`] runs an ordered list of [`Pass`]es over the lines of
//! a document. [`Postprocessor::standard()`] is the sequence `bcms
//! postprocess` applies.

use std::borrow::Cow;
use std::io::{BufRead, Write};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::Settings;
use crate::error::{Chainable, Result};

/// One transformation over the lines of a document. Every line keeps its
/// trailing newline, if it had one.
pub trait Pass: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, lines: Vec<String>) -> Vec<String>;
}

#[derive(Default)]
pub struct Postprocessor {
    passes: Vec<Box<dyn Pass>>,
}

impl Postprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `pass` to the end of the sequence.
    pub fn pass<P: Pass + 'static>(mut self, pass: P) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// The standard sequence: pandoc bug fixes, then enhancements, then
    /// cosmetics. Image urls get the webroot only when one is configured.
    pub fn standard(settings: &Settings) -> Self {
        let processor = Postprocessor::new()
            .pass(OldPandocFixes)
            .pass(NewPandocFixes)
            .pass(LinkImages)
            .pass(OpenTabs)
            .pass(Tooltips);

        let processor = match settings.webroot.trim_end_matches('/') {
            "" => processor,
            webroot => processor.pass(Webroot::new(webroot)),
        };

        processor.pass(Tidy)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn run_lines(&self, lines: Vec<String>) -> Vec<String> {
        self.passes.iter().fold(lines, |lines, pass| {
            tracing::trace!(pass = pass.name(), lines = lines.len(), "running pass");
            pass.apply(lines)
        })
    }

    /// Postprocesses a whole document. The output ends with an extra
    /// newline, matching what `bcms postprocess` prints.
    pub fn run(&self, input: &str) -> String {
        let lines = input.split_inclusive('\n').map(String::from).collect();
        let mut output = self.run_lines(lines).concat();
        output.push('\n');
        output
    }

    pub fn run_io<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> Result<()> {
        let mut text = String::new();
        input.read_to_string(&mut text).chain(error!("failed to read HTML input"))?;
        output.write_all(self.run(&text).as_bytes())
            .and_then(|_| output.flush())
            .chain(error!("failed to write HTML output"))
    }
}

fn replace_all(lines: Vec<String>, re: &Regex, replace: impl Fn(&Captures<'_>) -> String) -> Vec<String> {
    lines.into_iter()
        .map(|line| {
            let replaced = match re.replace_all(&line, &replace) {
                Cow::Borrowed(_) => None,
                Cow::Owned(new) => Some(new),
            };

            replaced.unwrap_or(line)
        })
        .collect()
}

fn replace_str(lines: Vec<String>, from: &str, to: &str) -> Vec<String> {
    lines.into_iter()
        .map(|line| if line.contains(from) { line.replace(from, to) } else { line })
        .collect()
}

/// Older pandoc releases escape the envelope badge markup.
pub struct OldPandocFixes;

impl Pass for OldPandocFixes {
    fn name(&self) -> &'static str { "old-pandoc-fixes" }

    fn apply(&self, lines: Vec<String>) -> Vec<String> {
        replace_str(lines,
            "&lt;span class=&quot;fa fa-envelope badge&quot;&gt;&lt;/span&gt;",
            r#"<span class="fa fa-envelope badge"></span>"#)
    }
}

static TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<title>(\d+)// (.*?)</title>").unwrap());
static META: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<meta (.*?) content="(\d+)// (.*?)" />"#).unwrap());
static H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\s+)<h1 (.*?)>(\d+)// (.*?)</h1>").unwrap());

/// Newer pandoc releases escape html in template variables and need the
/// numbered title workaround undone.
pub struct NewPandocFixes;

impl Pass for NewPandocFixes {
    fn name(&self) -> &'static str { "new-pandoc-fixes" }

    fn apply(&self, lines: Vec<String>) -> Vec<String> {
        let lines = replace_str(lines, "&lt;a href=“", r#"<a href=""#);
        let lines = replace_str(lines, "”&gt;", r#"">"#);

        let lines = replace_all(lines, &TITLE, |c| format!("<title>{}. {}</title>", &c[1], &c[2]));
        let lines = replace_all(lines, &META, |c| {
            format!(r#"<meta {} content="{}. {}" />"#, &c[1], &c[2], &c[3])
        });

        let lines = replace_all(lines, &H1, |c| {
            format!("{}<h1 {}>{}. {}</h1>", &c[1], &c[2], &c[3], &c[4])
        });

        replace_str(lines, "<p><br /></p>", "<br />\n")
    }
}

static SIZED_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(<img src="/images/sized/(.*?)" .*? />)"#).unwrap()
});

/// Wraps resized images in a link to the full-size original.
pub struct LinkImages;

impl Pass for LinkImages {
    fn name(&self) -> &'static str { "link-images" }

    fn apply(&self, lines: Vec<String>) -> Vec<String> {
        replace_all(lines, &SIZED_IMAGE, |c| format!(r#"<a href="/images/{}">{}</a>"#, &c[2], &c[1]))
    }
}

static BADGE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(<a href="([^"]*?)"><span class="fa (.*?)">)"#).unwrap()
});

/// Social badge links open in a new tab.
pub struct OpenTabs;

impl Pass for OpenTabs {
    fn name(&self) -> &'static str { "open-tabs" }

    fn apply(&self, lines: Vec<String>) -> Vec<String> {
        replace_all(lines, &BADGE_LINK, |c| {
            format!(r#"<a href="{}" target="_blank"><span class="fa {}">"#, &c[2], &c[3])
        })
    }
}

static BADGE_LINK_ATTRS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(<a href="([^"]*?)" (.*?)><span class="fa (.*?)">)"#).unwrap()
});

/// Social badge links get a tooltip naming the service.
pub struct Tooltips;

impl Tooltips {
    pub fn title_for(url: &str) -> Option<&'static str> {
        const TITLES: &[(&str, &str)] = &[
            ("twitter", "Tweet this"),
            ("facebook", "Share this on Facebook"),
            ("google", "Share this on Google+"),
            ("linkedin", "Share this on LinkedIn"),
            ("mailto", "Share this by Email"),
        ];

        TITLES.iter().find(|(needle, _)| url.contains(needle)).map(|(_, title)| *title)
    }
}

impl Pass for Tooltips {
    fn name(&self) -> &'static str { "tooltips" }

    fn apply(&self, lines: Vec<String>) -> Vec<String> {
        replace_all(lines, &BADGE_LINK_ATTRS, |c| match Self::title_for(&c[2]) {
            Some(title) => format!(r#"<a href="{}" {} title="{}"><span class="fa {}">"#,
                &c[2], &c[3], title, &c[4]),
            None => c[0].to_string(),
        })
    }
}

static IMAGE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(src|href)="/images/(.*?)""#).unwrap());

/// Prefixes `/images/...` urls with the site's webroot.
pub struct Webroot {
    root: String,
}

impl Webroot {
    pub fn new<S: Into<String>>(root: S) -> Self {
        Webroot { root: root.into() }
    }
}

impl Pass for Webroot {
    fn name(&self) -> &'static str { "webroot" }

    fn apply(&self, lines: Vec<String>) -> Vec<String> {
        replace_all(lines, &IMAGE_URL, |c| format!(r#"{}="{}/images/{}""#, &c[1], self.root, &c[2]))
    }
}

/// Cosmetic spacing: room around `<hr />` and before the body `<div>`, and
/// `</div>` kept on one line with the comment that labels it.
pub struct Tidy;

impl Tidy {
    /// The comment on `line` if the line is nothing but an HTML comment,
    /// bare or wrapped in a paragraph.
    fn comment(line: &str) -> Option<&str> {
        let line = line.trim_end();
        if line.starts_with("<!--") && line.ends_with("-->") {
            return Some(line);
        }

        line.strip_prefix("<p>")
            .and_then(|l| l.strip_suffix("</p>"))
            .filter(|l| l.starts_with("<!--") && l.ends_with("-->"))
    }
}

impl Pass for Tidy {
    fn name(&self) -> &'static str { "tidy" }

    fn apply(&self, lines: Vec<String>) -> Vec<String> {
        let lines = replace_str(lines, "<hr />", "\n<hr />\n");

        let mut output = Vec::with_capacity(lines.len());
        let mut lines = lines.into_iter().peekable();
        while let Some(line) = lines.next() {
            let comment = lines.peek()
                .filter(|_| line.starts_with("</div>"))
                .and_then(|next| Self::comment(next))
                .map(String::from);

            match comment {
                Some(comment) => {
                    let div = line.trim_end_matches(['\r', '\n']);
                    output.push(format!("{div} {comment}\n"));
                    lines.next();
                }
                None => output.push(line),
            }
        }

        output.into_iter()
            .map(|line| match line.starts_with(r#"<div class="body">"#) {
                true => format!("\n{line}"),
                false => line,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply<P: Pass>(pass: P, input: &str) -> String {
        let lines = input.split_inclusive('\n').map(String::from).collect();
        pass.apply(lines).concat()
    }

    #[test]
    fn old_pandoc_badge() {
        let input = "<a>&lt;span class=&quot;fa fa-envelope badge&quot;&gt;&lt;/span&gt;</a>\n";
        assert_eq!(apply(OldPandocFixes, input), "<a><span class=\"fa fa-envelope badge\"></span></a>\n");
    }

    #[test]
    fn new_pandoc_escapes_and_titles() {
        let input = "<p>&lt;a href=“http://x.org/”&gt;x</a></p>\n\
            <title>3// Install</title>\n\
            <meta name=\"dcterms.title\" content=\"3// Install\" />\n\
            \x20 <h1 class=\"title\">3// Install</h1>\n\
            <h1 class=\"title\">4// Flush</h1>\n\
            <p><br /></p>\n";

        assert_eq!(apply(NewPandocFixes, input), "<p><a href=\"http://x.org/\">x</a></p>\n\
            <title>3. Install</title>\n\
            <meta name=\"dcterms.title\" content=\"3. Install\" />\n\
            \x20 <h1 class=\"title\">3. Install</h1>\n\
            <h1 class=\"title\">4// Flush</h1>\n\
            <br />\n\n");
    }

    #[test]
    fn sized_images_link_to_originals() {
        let input = "<p><img src=\"/images/sized/cat.jpg\" alt=\"cat\" /></p>\n";
        assert_eq!(apply(LinkImages, input),
            "<p><a href=\"/images/cat.jpg\"><img src=\"/images/sized/cat.jpg\" alt=\"cat\" /></a></p>\n");

        let untouched = "<img src=\"/images/cat.jpg\" alt=\"cat\" />\n";
        assert_eq!(apply(LinkImages, untouched), untouched);
    }

    #[test]
    fn badges_open_tabs_and_get_tooltips() {
        let input = "<a href=\"https://twitter.com/share?u=x\"><span class=\"fa fa-twitter badge\"></span></a>\n\
            <a href=\"mailto:?subject=x\"><span class=\"fa fa-envelope badge\"></span></a>\n\
            <a href=\"https://example.com/\"><span class=\"fa fa-rss badge\"></span></a>\n";

        let output = Postprocessor::new().pass(OpenTabs).pass(Tooltips).run(input);
        assert_eq!(output, "<a href=\"https://twitter.com/share?u=x\" target=\"_blank\" title=\"Tweet this\"><span class=\"fa fa-twitter badge\"></span></a>\n\
            <a href=\"mailto:?subject=x\" target=\"_blank\" title=\"Share this by Email\"><span class=\"fa fa-envelope badge\"></span></a>\n\
            <a href=\"https://example.com/\" target=\"_blank\"><span class=\"fa fa-rss badge\"></span></a>\n\n");
    }

    #[test]
    fn tooltip_titles() {
        assert_eq!(Tooltips::title_for("https://www.facebook.com/sharer.php"), Some("Share this on Facebook"));
        assert_eq!(Tooltips::title_for("https://plus.google.com/share"), Some("Share this on Google+"));
        assert_eq!(Tooltips::title_for("https://www.linkedin.com/shareArticle"), Some("Share this on LinkedIn"));
        assert_eq!(Tooltips::title_for("https://github.com/"), None);
    }

    #[test]
    fn webroot_prefixes_image_urls() {
        let input = "<a href=\"/images/a.png\"><img src=\"/images/sized/a.png\" /></a> <a href=\"/about/\">x</a>\n";
        assert_eq!(apply(Webroot::new("/blog"), input),
            "<a href=\"/blog/images/a.png\"><img src=\"/blog/images/sized/a.png\" /></a> <a href=\"/about/\">x</a>\n");
    }

    #[test]
    fn tidy_spacing_and_comments() {
        let input = "<p>a</p><hr /><p>b</p>\n\
            </div>\n\
            <!-- end of header -->\n\
            </div>\n\
            <p><!-- end of body --></p>\n\
            </div>\n\
            <p>not a comment</p>\n\
            <div class=\"body\">\n";

        assert_eq!(apply(Tidy, input), "<p>a</p>\n<hr />\n<p>b</p>\n\
            </div> <!-- end of header -->\n\
            </div> <!-- end of body -->\n\
            </div>\n\
            <p>not a comment</p>\n\
            \n<div class=\"body\">\n");
    }

    #[test]
    fn tidy_joins_crlf_lines() {
        assert_eq!(apply(Tidy, "</div>\r\n<!-- end -->\r\n<p>x</p>\r\n"), "</div> <!-- end -->\n<p>x</p>\r\n");
    }

    #[test]
    fn standard_sequence() {
        let names = Postprocessor::standard(&Settings::default()).names();
        assert_eq!(names, ["old-pandoc-fixes", "new-pandoc-fixes", "link-images", "open-tabs", "tooltips", "tidy"]);

        let settings = Settings { webroot: "/blog/".into(), ..Settings::default() };
        let names = Postprocessor::standard(&settings).names();
        assert_eq!(names[5], "webroot");
        assert_eq!(names.len(), 7);

        let html = "<p><img src=\"/images/sized/a.png\" alt=\"a\" /></p>\n";
        assert_eq!(Postprocessor::standard(&settings).run(html),
            "<p><a href=\"/blog/images/a.png\"><img src=\"/blog/images/sized/a.png\" alt=\"a\" /></a></p>\n\n");
    }

    #[test]
    fn run_io_round_trip() {
        let input = "<title>1// Start</title>\n<hr />\n";
        let mut output = vec![];
        Postprocessor::standard(&Settings::default()).run_io(input.as_bytes(), &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "<title>1. Start</title>\n\n<hr />\n\n\n");
    }

    #[test]
    fn numbered_titles_survive_pandoc() {
        let page = crate::preprocess::preprocess("---\ntitle: 2. Installation\n---\nBody\n");
        let title = page.lines().nth(1).and_then(|l| l.strip_prefix("title: ")).unwrap();
        assert_eq!(title, "2// Installation");

        // What pandoc's html5 template makes of the title.
        let html = format!("<title>{title}</title>\n<meta name=\"dcterms.title\" content=\"{title}\" />\n\
            <header>\n  <h1 class=\"title\">{title}</h1>\n</header>\n");

        let output = Postprocessor::standard(&Settings::default()).run(&html);
        assert!(!output.contains("//"));
        assert_eq!(output.matches("2. Installation").count(), 3);
    }
}
