//! Comment stripping
//!
//! Splits source text into lines of code with comments removed, keeping
//! each line's trailing comment text aside so it can become a tag
//! description. Comments that open before any code on a line (or carry
//! over from an earlier line) are dropped. String literals (and, for dialects with quoted names,
//! double-quoted identifiers) are passed through untouched.

use super::SourceSyntax;

/// One physical source line after comment removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based line number
    pub number: usize,
    pub code: String,
    /// Text of comments opened after code on this line
    pub comment: String,
}

impl SourceLine {
    fn new(number: usize) -> Self {
        Self {
            number,
            code: String::new(),
            comment: String::new(),
        }
    }

    fn finish(mut self) -> Self {
        let comment = self.comment.split_whitespace().collect::<Vec<_>>().join(" ");
        self.comment = comment;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    LineComment,
    BlockComment(&'static str),
    Braces,
    Quoted { quote: char, escaped: bool },
}

pub fn split_lines(source: &str, syntax: &SourceSyntax) -> Vec<SourceLine> {
    let mut lines = Vec::new();
    let mut current = SourceLine::new(1);
    let mut state = State::Code;
    let mut trailing = false;
    let mut rest = source;

    while let Some(c) = rest.chars().next() {
        if c == '\n' {
            let number = current.number + 1;
            lines.push(std::mem::replace(&mut current, SourceLine::new(number)).finish());
            // Line comments and string literals never span lines
            if matches!(state, State::LineComment | State::Quoted { .. }) {
                state = State::Code;
            }
            trailing = false;
            rest = &rest[1..];
            continue;
        }

        match state {
            State::Code => {
                if rest.starts_with("//") {
                    state = State::LineComment;
                    trailing = !current.code.trim().is_empty();
                    rest = &rest[2..];
                    continue;
                }
                if let Some((open, close)) = syntax
                    .block_comments
                    .iter()
                    .find(|(open, _)| rest.starts_with(open))
                {
                    state = State::BlockComment(*close);
                    trailing = !current.code.trim().is_empty();
                    if trailing {
                        current.comment.push(' ');
                    }
                    current.code.push(' ');
                    rest = &rest[open.len()..];
                    continue;
                }
                if syntax.brace_blocks && c == '{' {
                    state = State::Braces;
                    current.code.push(' ');
                } else {
                    if c == '\'' || (syntax.quoted_names && c == '"') {
                        state = State::Quoted {
                            quote: c,
                            escaped: false,
                        };
                    }
                    current.code.push(c);
                }
            }
            State::LineComment => {
                if trailing {
                    current.comment.push(c);
                }
            }
            State::BlockComment(close) => {
                if rest.starts_with(close) {
                    state = State::Code;
                    if trailing {
                        current.comment.push(' ');
                    }
                    rest = &rest[close.len()..];
                    continue;
                }
                if trailing {
                    current.comment.push(c);
                }
            }
            State::Braces => {
                if c == '}' {
                    state = State::Code;
                }
            }
            State::Quoted { quote, escaped } => {
                current.code.push(c);
                state = if escaped {
                    State::Quoted {
                        quote,
                        escaped: false,
                    }
                } else if c == '$' {
                    State::Quoted {
                        quote,
                        escaped: true,
                    }
                } else if c == quote {
                    State::Code
                } else {
                    state
                };
            }
        }

        rest = &rest[c.len_utf8()..];
    }

    lines.push(current.finish());
    lines
}
