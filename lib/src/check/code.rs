use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Tag, TagEnd};

use crate::check::{shell, Rule, Scan};
use crate::report::Diagnostic;

pub const SHELL_SYNTAX: &str = "shell-syntax";

/// Info strings of fenced blocks holding shell. An empty info string is
/// read as shell too: installation pages rarely label their commands.
const SHELL_LANGUAGES: &[&str] = &["", "sh", "bash", "shell", "zsh", "console"];

#[derive(Debug)]
struct Block {
    language: String,
    fence: usize,
    code: String,
}

/// Validates the shell syntax of fenced code blocks.
#[derive(Debug, Default)]
pub struct ShellBlocks {
    current: Option<Block>,
    blocks: Vec<Block>,
}

impl Block {
    /// The script to validate and, for each of its lines, the line of the
    /// block it came from. Console blocks keep only `$ ` prompt lines.
    fn script(&self) -> (String, Vec<usize>) {
        if self.language != "console" {
            let lines = (0..self.code.lines().count().max(1)).collect();
            return (self.code.clone(), lines);
        }

        let mut script = String::new();
        let mut lines = vec![];
        for (i, line) in self.code.lines().enumerate() {
            if let Some(command) = line.strip_prefix("$ ") {
                script.push_str(command);
                script.push('\n');
                lines.push(i);
            }
        }

        (script, lines)
    }
}

impl Rule for ShellBlocks {
    fn event(&mut self, event: &Event<'_>, span: Range<usize>) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let language = info.split_whitespace().next().unwrap_or("").to_ascii_lowercase();
                self.current = Some(Block { language, fence: span.start, code: String::new() });
            }
            Event::Text(text) => if let Some(block) = &mut self.current {
                block.code.push_str(text);
            },
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = self.current.take() {
                    if SHELL_LANGUAGES.contains(&block.language.as_str()) {
                        self.blocks.push(block);
                    }
                }
            }
            _ => {}
        }
    }

    fn finalize(&mut self, scan: &Scan<'_>, diagnostics: &mut Vec<Diagnostic>) {
        for block in &self.blocks {
            let (script, lines) = block.script();
            if let Err(e) = shell::validate(&script) {
                let block_line = lines.get(e.line).copied().unwrap_or(0);
                let line = scan.line(block.fence) + 1 + block_line;
                diagnostics.push(Diagnostic::error(SHELL_SYNTAX, line, e.message));
            }
        }
    }
}
