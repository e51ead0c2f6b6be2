//! Store-compatible glob patterns, as accepted by `KEYS` and `SCAN MATCH`.
//!
//! - `*` matches any sequence (including empty)
//! - `?` matches one byte
//! - `[abc]`, `[a-z]`, `[^abc]` match one byte from (or not from) a class
//! - `\x` matches `x` literally

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Star,
    Any,
    Byte(u8),
    Class { bytes: Vec<u8>, negated: bool },
}

/// A compiled glob pattern
#[derive(Debug, Clone)]
pub struct Glob {
    tokens: Vec<Token>,
}

impl Glob {
    pub fn new(pattern: &str) -> Self {
        Self {
            tokens: compile(pattern.as_bytes()),
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        let input = key.as_bytes();
        let tokens = &self.tokens;
        let (mut ti, mut ii) = (0, 0);
        // Last star seen and the input position it is currently absorbing up to
        let mut backtrack: Option<(usize, usize)> = None;

        while ii < input.len() || ti < tokens.len() {
            if ti < tokens.len() {
                let advanced = match &tokens[ti] {
                    Token::Star => {
                        backtrack = Some((ti, ii));
                        ti += 1;
                        continue;
                    }
                    Token::Any => ii < input.len(),
                    Token::Byte(b) => ii < input.len() && input[ii] == *b,
                    Token::Class { bytes, negated } => {
                        ii < input.len() && !bytes.is_empty() && bytes.contains(&input[ii]) != *negated
                    }
                };
                if advanced {
                    ti += 1;
                    ii += 1;
                    continue;
                }
            }

            match backtrack {
                Some((star_ti, star_ii)) if star_ii < input.len() => {
                    backtrack = Some((star_ti, star_ii + 1));
                    ti = star_ti + 1;
                    ii = star_ii + 1;
                }
                _ => return false,
            }
        }

        true
    }
}

fn compile(pattern: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < pattern.len() {
        match pattern[i] {
            b'*' => {
                if tokens.last() != Some(&Token::Star) {
                    tokens.push(Token::Star);
                }
                i += 1;
            }
            b'?' => {
                tokens.push(Token::Any);
                i += 1;
            }
            b'[' => {
                let (token, consumed) = compile_class(&pattern[i + 1..]);
                tokens.push(token);
                i += 1 + consumed;
            }
            b'\\' if i + 1 < pattern.len() => {
                tokens.push(Token::Byte(pattern[i + 1]));
                i += 2;
            }
            b => {
                tokens.push(Token::Byte(b));
                i += 1;
            }
        }
    }

    tokens
}

/// Parses the body of a `[...]` class; `body` starts just after the `[`.
/// An unclosed class swallows the rest of the pattern.
fn compile_class(body: &[u8]) -> (Token, usize) {
    let mut bytes = Vec::new();
    let mut i = 0;
    let negated = matches!(body.first(), Some(b'^') | Some(b'!'));
    if negated {
        i += 1;
    }

    while i < body.len() && body[i] != b']' {
        if body[i] == b'\\' && i + 1 < body.len() {
            bytes.push(body[i + 1]);
            i += 2;
        } else if i + 2 < body.len() && body[i + 1] == b'-' && body[i + 2] != b']' {
            let (lo, hi) = (body[i].min(body[i + 2]), body[i].max(body[i + 2]));
            bytes.extend(lo..=hi);
            i += 3;
        } else {
            bytes.push(body[i]);
            i += 1;
        }
    }
    if i < body.len() {
        i += 1;
    }

    (Token::Class { bytes, negated }, i)
}

/// Escape every glob metacharacter so `text` only matches itself.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `MATCH` pattern selecting every key that starts with the literal `prefix`.
pub fn prefix_pattern(prefix: &str) -> String {
    format!("{}*", escape(prefix))
}
