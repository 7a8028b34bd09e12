//! A shell syntax checker for the commands shown in documentation.
//!
//! This is not a shell parser. It tokenizes POSIX-ish shell (quotes,
//! escapes, substitutions, operators, redirections) and checks that the
//! operators are placed where a shell accepts them. `<word>` is read as a
//! placeholder argument, the way documentation writes `<branchname>`.
//! Here-document bodies are skipped, and `case` patterns and array
//! assignments are understood well enough not to be mistaken for groups.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// A syntax error. `line` is 0-based within the checked script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        SyntaxError { line, message: message.into() }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line + 1, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Control(&'static str),
    Redirect(&'static str),
    Newline,
    Open,
    Close,
}

/// A here-document whose body starts after the current line.
#[derive(Debug)]
struct HereDoc {
    delimiter: String,
    strip_tabs: bool,
    line: usize,
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    tokens: Vec<(Token, usize)>,
    heredocs: Vec<HereDoc>,
}

fn is_word_char(c: char) -> bool {
    !matches!(c, ' ' | '\t' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>')
}

impl<'a> Lexer<'a> {
    fn new(script: &'a str) -> Self {
        Lexer { chars: script.chars().peekable(), line: 0, tokens: vec![], heredocs: vec![] }
    }

    fn eat(&mut self, c: char) -> bool {
        self.chars.next_if_eq(&c).is_some()
    }

    fn push(&mut self, token: Token) {
        self.tokens.push((token, self.line));
    }

    /// Consumes characters through `close`, counting lines. `nest` opens a
    /// nested pair (for `$(...)`); quotes inside the pair are honored.
    fn skip_through(&mut self, close: char, nest: Option<char>, what: &str) -> Result<(), SyntaxError> {
        let start = self.line;
        let mut depth = 0;
        while let Some(c) = self.chars.next() {
            match c {
                '\n' => self.line += 1,
                '\\' if close != '\'' => {
                    if self.chars.next() == Some('\n') {
                        self.line += 1;
                    }
                }
                '\'' if nest.is_some() => self.skip_through('\'', None, "single quote")?,
                '"' if nest.is_some() => self.skip_through('"', None, "double quote")?,
                c if Some(c) == nest => depth += 1,
                c if c == close && depth > 0 => depth -= 1,
                c if c == close => return Ok(()),
                _ => {}
            }
        }

        Err(SyntaxError::new(start, format!("unterminated {what}")))
    }

    /// Reads a `<name>` placeholder if one starts here. The `<` has been
    /// consumed.
    fn placeholder(&mut self) -> Option<String> {
        let mut lookahead = self.chars.clone();
        let mut name = String::from("<");
        match lookahead.next() {
            Some(c) if c.is_ascii_alphabetic() => name.push(c),
            _ => return None,
        }

        while let Some(c) = lookahead.next() {
            match c {
                '>' => {
                    self.chars = lookahead;
                    name.push('>');
                    return Some(name);
                }
                c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => name.push(c),
                _ => return None,
            }
        }

        None
    }

    /// Reads a here-document delimiter with its quoting removed. `None` if
    /// no word follows.
    fn delimiter(&mut self) -> Result<Option<String>, SyntaxError> {
        while self.chars.next_if(|&c| c == ' ' || c == '\t').is_some() { }

        let mut delimiter = None::<String>;
        while let Some(c) = self.chars.next_if(|&c| is_word_char(c)) {
            let delimiter = delimiter.get_or_insert_with(String::new);
            match c {
                '\'' | '"' => loop {
                    match self.chars.next() {
                        Some(q) if q == c => break,
                        Some(q) => {
                            self.line += usize::from(q == '\n');
                            delimiter.push(q);
                        }
                        None => {
                            let what = if c == '\'' { "single" } else { "double" };
                            return Err(SyntaxError::new(self.line, format!("unterminated {what} quote")));
                        }
                    }
                },
                '\\' => delimiter.extend(self.chars.next()),
                c => delimiter.push(c),
            }
        }

        Ok(delimiter)
    }

    /// Handles the rest of a `<<` operator: a here-string (`<<<`) or a
    /// here-document (`<<`, `<<-`) and its delimiter.
    fn here(&mut self) -> Result<(), SyntaxError> {
        if self.eat('<') {
            self.push(Token::Redirect("<<<"));
            return Ok(());
        }

        let strip_tabs = self.eat('-');
        self.push(Token::Redirect("<<"));
        if let Some(delimiter) = self.delimiter()? {
            self.push(Token::Word(delimiter.clone()));
            self.heredocs.push(HereDoc { delimiter, strip_tabs, line: self.line });
        }

        Ok(())
    }

    /// Skips the bodies of the here-documents opened on the line just
    /// ended, through their delimiter lines.
    fn bodies(&mut self) -> Result<(), SyntaxError> {
        for doc in std::mem::take(&mut self.heredocs) {
            loop {
                if self.chars.peek().is_none() {
                    return Err(SyntaxError::new(doc.line, "unterminated here-document"));
                }

                let mut line = String::new();
                while let Some(c) = self.chars.next_if(|&c| c != '\n') {
                    line.push(c);
                }

                if self.eat('\n') {
                    self.line += 1;
                }

                let body_line = match doc.strip_tabs {
                    true => line.trim_start_matches('\t'),
                    false => line.as_str(),
                };

                if body_line == doc.delimiter {
                    break;
                }
            }
        }

        Ok(())
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>, SyntaxError> {
        // `Some(digits_only)` while inside a word.
        let mut word: Option<bool> = None;
        let mut text = String::new();
        while let Some(c) = self.chars.next() {
            if !is_word_char(c) {
                let fd_prefix = word == Some(true) && matches!(c, '<' | '>');
                let finished = std::mem::take(&mut text);
                if word.take().is_some() && !fd_prefix {
                    self.push(Token::Word(finished));
                }
            }

            match c {
                ' ' | '\t' => {}
                '\n' => {
                    self.push(Token::Newline);
                    self.line += 1;
                    self.bodies()?;
                }
                ';' if self.eat(';') => {
                    let op = if self.eat('&') { ";;&" } else { ";;" };
                    self.push(Token::Control(op));
                }
                ';' if self.eat('&') => self.push(Token::Control(";&")),
                ';' => self.push(Token::Control(";")),
                '&' if self.eat('&') => self.push(Token::Control("&&")),
                '&' if self.eat('>') => {
                    self.eat('>');
                    self.push(Token::Redirect("&>"));
                }
                '&' => self.push(Token::Control("&")),
                '|' if self.eat('|') => self.push(Token::Control("||")),
                '|' => {
                    self.eat('&');
                    self.push(Token::Control("|"));
                }
                '(' => self.push(Token::Open),
                ')' => self.push(Token::Close),
                '<' => if let Some(name) = self.placeholder() {
                    self.push(Token::Word(name));
                } else if self.eat('(') {
                    self.skip_through(')', Some('('), "`<(`")?;
                    text.push_str("<(");
                    word = Some(false);
                } else if self.eat('<') {
                    self.here()?;
                } else {
                    self.eat('&');
                    self.eat('>');
                    self.push(Token::Redirect("<"));
                },
                '>' => {
                    let op = if self.eat('>') { ">>" } else { ">" };
                    if !self.eat('&') {
                        self.eat('|');
                    }

                    self.push(Token::Redirect(op));
                }
                '#' if word.is_none() => {
                    while self.chars.next_if(|&c| c != '\n').is_some() { }
                }
                c => {
                    let digits = word.unwrap_or(true) && c.is_ascii_digit();
                    text.push(c);
                    match c {
                        '\\' => match self.chars.next() {
                            Some('\n') => {
                                self.line += 1;
                                text.pop();
                                if word.is_none() {
                                    continue;
                                }
                            }
                            Some(escaped) => text.push(escaped),
                            None => return Err(SyntaxError::new(self.line, "trailing `\\`")),
                        },
                        '\'' => self.skip_through('\'', None, "single quote")?,
                        '"' => self.skip_through('"', None, "double quote")?,
                        '`' => self.skip_through('`', None, "backquote")?,
                        '$' if self.eat('(') => self.skip_through(')', Some('('), "`$(`")?,
                        '$' if self.eat('{') => self.skip_through('}', None, "`${`")?,
                        _ => {}
                    }

                    word = Some(digits);
                }
            }
        }

        if word.is_some() {
            self.push(Token::Word(text));
        }

        if let Some(doc) = self.heredocs.first() {
            return Err(SyntaxError::new(doc.line, "unterminated here-document"));
        }

        Ok(self.tokens)
    }
}

/// Where a `case` command is: before its subject, before `in`, reading an
/// arm's patterns, or in an arm's commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Case {
    Subject,
    In,
    Pattern,
    Body,
}

enum Step {
    To(Case),
    End,
    Command,
}

/// Checks that `script` is syntactically valid shell.
pub fn validate(script: &str) -> Result<(), SyntaxError> {
    let tokens = Lexer::new(script).tokenize()?;

    let mut expect_command = true;
    let mut pending: Option<(&str, usize)> = None;
    let mut groups: Vec<usize> = vec![];
    let mut cases: Vec<(Case, usize)> = vec![];
    let mut last_word: Option<String> = None;
    let mut iter = tokens.into_iter();
    while let Some((token, line)) = iter.next() {
        let previous_word = last_word.take();
        if let Some(&(case, _)) = cases.last() {
            let step = match (case, &token) {
                (Case::Subject, Token::Word(_)) => Step::To(Case::In),
                (Case::In, Token::Newline) => Step::To(Case::In),
                (Case::In, Token::Word(w)) if w == "in" => Step::To(Case::Pattern),
                (Case::Subject | Case::In, _) => {
                    return Err(SyntaxError::new(line, "`case` is missing `in`"));
                }
                (Case::Pattern, Token::Word(w)) if w == "esac" => Step::End,
                (Case::Pattern, Token::Word(_) | Token::Newline | Token::Open) => Step::To(Case::Pattern),
                (Case::Pattern, Token::Control(op)) if *op == "|" => Step::To(Case::Pattern),
                (Case::Pattern, Token::Close) => Step::To(Case::Body),
                (Case::Pattern, _) => return Err(SyntaxError::new(line, "malformed `case` pattern")),
                (Case::Body, Token::Control(op)) if matches!(*op, ";;" | ";&" | ";;&") => {
                    Step::To(Case::Pattern)
                }
                (Case::Body, Token::Word(w)) if w == "esac" && expect_command => Step::End,
                (Case::Body, _) => Step::Command,
            };

            match step {
                Step::To(next) => {
                    if let Some(top) = cases.last_mut() {
                        top.0 = next;
                    }

                    expect_command = true;
                    pending = None;
                    continue;
                }
                Step::End => {
                    cases.pop();
                    expect_command = false;
                    pending = None;
                    continue;
                }
                Step::Command => {}
            }
        }

        match token {
            Token::Word(word) => {
                if expect_command && word == "case" {
                    cases.push((Case::Subject, line));
                }

                expect_command = false;
                pending = None;
                last_word = Some(word);
            }
            Token::Redirect(op) => match iter.next() {
                Some((Token::Word(_), _)) => {
                    expect_command = false;
                    pending = None;
                }
                _ => return Err(SyntaxError::new(line, format!("missing target after `{op}`"))),
            },
            Token::Control(op) => {
                if expect_command || matches!(op, ";;" | ";&" | ";;&") {
                    return Err(SyntaxError::new(line, format!("unexpected `{op}`")));
                }

                expect_command = true;
                pending = matches!(op, "&&" | "||" | "|").then_some((op, line));
            }
            Token::Newline => {
                if pending.is_none() {
                    expect_command = true;
                }
            }
            // `name=(a b c)`
            Token::Open if previous_word.as_deref().is_some_and(|w| w.ends_with('=')) => loop {
                match iter.next() {
                    Some((Token::Word(_) | Token::Newline, _)) => {}
                    Some((Token::Close, _)) => break,
                    Some((_, line)) => return Err(SyntaxError::new(line, "unexpected operator in array")),
                    None => return Err(SyntaxError::new(line, "unclosed `(`")),
                }
            },
            Token::Open if !expect_command => match iter.next() {
                // `name() { ...; }`
                Some((Token::Close, _)) => {}
                _ => return Err(SyntaxError::new(line, "unexpected `(`")),
            },
            Token::Open => {
                groups.push(line);
                pending = None;
            }
            Token::Close => {
                if groups.pop().is_none() {
                    return Err(SyntaxError::new(line, "unexpected `)`"));
                }

                if let Some((op, _)) = pending {
                    return Err(SyntaxError::new(line, format!("unexpected `)` after `{op}`")));
                }

                expect_command = false;
            }
        }
    }

    if let Some((op, line)) = pending {
        return Err(SyntaxError::new(line, format!("`{op}` is not followed by a command")));
    }

    if let Some(line) = groups.pop() {
        return Err(SyntaxError::new(line, "unclosed `(`"));
    }

    if let Some((_, line)) = cases.pop() {
        return Err(SyntaxError::new(line, "`case` without `esac`"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(script: &str) -> (usize, String) {
        let e = validate(script).unwrap_err();
        (e.line, e.message)
    }

    #[test]
    fn documentation_commands_are_valid() {
        let scripts = [
            "git clone https://github.com/tomduck/bassclef.git --recursive\ncd bassclef\n",
            "make && make serve",
            "git checkout -b <branchname>",
            "pip3 install --user pyyaml 2>&1 | tee install.log",
            "ls content |\n  grep -v '^_' # drafts",
            "echo \"built on $(date +%F)\" > out.txt; cat out.txt",
            "python3 -c \"import yaml\" || echo 'use pip3, not pip'",
            "(cd www && python3 -m http.server 8000) &",
            "serve() { make serve; }\nserve",
            "convert in.png -resize 50% \\\n  out.png",
            "diff <(sort a) <(sort b) &>/dev/null",
            "",
        ];

        for script in scripts {
            assert_eq!(validate(script), Ok(()), "{script:?}");
        }
    }

    #[test]
    fn dangling_operators() {
        assert_eq!(error("make &&"), (0, "`&&` is not followed by a command".into()));
        assert_eq!(error("make |\n\n"), (0, "`|` is not followed by a command".into()));
        assert_eq!(error("cd bassclef\n&& make"), (1, "unexpected `&&`".into()));
        assert_eq!(error("; ls"), (0, "unexpected `;`".into()));
        assert_eq!(error("make ; ; make"), (0, "unexpected `;`".into()));
    }

    #[test]
    fn redirections_need_targets() {
        assert_eq!(error("make >"), (0, "missing target after `>`".into()));
        assert_eq!(error("cat < | wc"), (0, "missing target after `<`".into()));
        assert_eq!(error("git checkout -b <branch name>"), (0, "missing target after `>`".into()));
    }

    #[test]
    fn unbalanced_quotes_and_groups() {
        assert_eq!(error("echo it's here"), (0, "unterminated single quote".into()));
        assert_eq!(error("ls\necho \"a\nb"), (1, "unterminated double quote".into()));
        assert_eq!(error("echo $(date"), (0, "unterminated `$(`".into()));
        assert_eq!(error("(cd a; make"), (0, "unclosed `(`".into()));
        assert_eq!(error("make)"), (0, "unexpected `)`".into()));
        assert_eq!(error("echo (x)"), (0, "unexpected `(`".into()));
    }

    #[test]
    fn here_documents_are_not_shell() {
        let scripts = [
            "cat >> notes.md <<EOF\nTom's notes\nEOF\n",
            "cat <<'EOF'\n$(not run\nEOF\n",
            "cat > config.toml <<\"END\" && echo done\nwebroot = \"it's mine\"\nEND",
            "cat <<-EOF\n\tindented (\n\tEOF\necho done",
            "cat <<A <<B\n'a\nA\n`b\nB\n",
            "grep -c x <<< \"$PATH\"",
        ];

        for script in scripts {
            assert_eq!(validate(script), Ok(()), "{script:?}");
        }
    }

    #[test]
    fn here_document_errors() {
        assert_eq!(error("ls\ncat <<EOF\nno end\n"), (1, "unterminated here-document".into()));
        assert_eq!(error("cat <<EOF"), (0, "unterminated here-document".into()));
        assert_eq!(error("cat <<-EOF\n  EOF\n"), (0, "unterminated here-document".into()));
        assert_eq!(error("cat <<\n"), (0, "missing target after `<<`".into()));
        assert_eq!(error("cat <<EOF\na\nEOF\nmake &&"), (3, "`&&` is not followed by a command".into()));
    }

    #[test]
    fn case_arms_and_arrays() {
        let scripts = [
            "case \"$1\" in\n  serve) make serve ;;\n  *) make ;;\nesac",
            "case $os in\n  (linux|darwin) echo unix ;;\n  -h|--help)\n    usage\n    ;;\n  *) ;;\nesac; echo after",
            "case x in x) case y in y) echo y ;; esac ;; esac",
            "files=(a.md b.md)\nfor f in \"${files[@]}\"; do pandoc \"$f\"; done",
            "pages+=(\n  index.md\n  about.md\n)",
        ];

        for script in scripts {
            assert_eq!(validate(script), Ok(()), "{script:?}");
        }

        assert_eq!(error("case x\n  x) ;;\nesac"), (1, "`case` is missing `in`".into()));
        assert_eq!(error("case x in\n  x) make ;;\n"), (0, "`case` without `esac`".into()));
        assert_eq!(error("make ;; make"), (0, "unexpected `;;`".into()));
        assert_eq!(error("files=(a | b)"), (0, "unexpected operator in array".into()));
        assert_eq!(error("files=(a b"), (0, "unclosed `(`".into()));
    }
}
