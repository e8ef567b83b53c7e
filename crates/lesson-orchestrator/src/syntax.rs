//! Advisory syntax heuristic.
//!
//! This is not a parser. It looks for unbalanced brackets and block openers
//! that are not followed by an indented line. Its findings are warnings only:
//! a run is never blocked because of them.

/// A suspicious construct found by [`check_syntax`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxWarning {
    /// 1-based line the warning refers to.
    pub line: usize,
    /// Human readable description.
    pub message: String,
}

impl std::fmt::Display for SyntaxWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Runs the heuristic over `source`.
#[must_use]
pub fn check_syntax(source: &str) -> Vec<SyntaxWarning> {
    let mut warnings = Vec::new();
    let mut open: Vec<(char, usize)> = Vec::new();
    let lines: Vec<&str> = source.lines().collect();

    for (index, line) in lines.iter().enumerate() {
        let line_no = index + 1;
        let code = strip_strings_and_comment(line);

        for c in code.chars() {
            match c {
                '(' | '[' | '{' => open.push((c, line_no)),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match open.last() {
                        Some(&(top, _)) if top == expected => {
                            open.pop();
                        }
                        _ => warnings.push(SyntaxWarning {
                            line: line_no,
                            message: format!("unmatched '{c}'"),
                        }),
                    }
                }
                _ => {}
            }
        }

        let trimmed = code.trim_end();
        if open.is_empty() && trimmed.ends_with(':') && !trimmed.trim_start().is_empty() {
            let indent = leading_spaces(line);
            let next = lines[index + 1..]
                .iter()
                .find(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'));
            if next.map_or(true, |l| leading_spaces(l) <= indent) {
                warnings.push(SyntaxWarning {
                    line: line_no,
                    message: "expected an indented block after ':'".to_string(),
                });
            }
        }
    }

    for (c, line) in open {
        warnings.push(SyntaxWarning {
            line,
            message: format!("'{c}' is never closed"),
        });
    }

    warnings
}

fn leading_spaces(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

/// Blanks out string literal contents and drops a trailing comment.
fn strip_strings_and_comment(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in line.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                    out.push(c);
                }
            }
            None => match c {
                '#' => break,
                '"' | '\'' => {
                    quote = Some(c);
                    out.push(c);
                }
                _ => out.push(c),
            },
        }
    }
    out
}
