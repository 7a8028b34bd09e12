#![doc = svgbobdoc::transform!(
//! Tooling for bassclef, a static site generator built around pandoc.
//!
//! # Overview
//!
//! A bassclef site is a directory of markdown pages, each with a front
//! matter block, that pandoc turns into HTML. This library covers the steps
//! around pandoc and the checks that keep pages healthy:
//!
//! ```svgbob
//!     +-----------+     +------------+     +--------+     +-------------+
//!     | page.md   +---->| preprocess +---->| pandoc +---->| postprocess |
//!     +-----+-----+     +------------+     +--------+     +------+------+
//!           |                                                    |
//!           v                                                    v
//!     +-----------+     +--------+                          +---------+
//!     |   check   +---->| Report |                          |  HTML   |
//!     +-----------+     +--------+                          +---------+
//! ```
//!
//!   * [`preprocess`] hides numbered titles (`1. Title`) from pandoc, which
//!     would otherwise render them as list items.
//!
//!   * [`postprocess`] runs an ordered list of line [passes] over pandoc's
//!     output: pandoc bug fixes, links around resized images, tooltips and
//!     new tabs for social badges, and cosmetic tidying.
//!
//!   * [`check`] lints pages: [front matter], reference links and their
//!     definitions, the shell in fenced code blocks, and `<nav>` links. Pages
//!     are found with [`FsTree`] and checked in parallel; the result is a
//!     [`Report`] of [`Diagnostic`]s.
//!
//!   * [`prereq`] probes for the tools a site build needs.
//!
//! Everything is configured by a site's [`config.toml`](config::CONFIG_FILE),
//! read into [`Settings`].
//!
//! [passes]: postprocess::Pass
//! [front matter]: frontmatter
//! [`FsTree`]: fstree::FsTree
//! [`Report`]: report::Report
//! [`Diagnostic`]: report::Diagnostic
//! [`Settings`]: config::Settings
)]

#[macro_use]
pub mod error;
pub mod util;
pub mod config;
pub mod fstree;
pub mod frontmatter;
pub mod report;
pub mod check;
pub mod preprocess;
pub mod postprocess;
pub mod prereq;

pub use config::Settings;
pub use report::{Diagnostic, Report, Severity};
