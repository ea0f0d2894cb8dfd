// MIT License
//
// Copyright (c) 2025 brace-templates contributors
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Template tokenization
//!
//! Splits a template string into an ordered sequence of tokens:
//! - Text: literal content
//! - Placeholder: `#NAME#`, resolved against the call arguments and the
//!   caller's placeholder map at tokenize time
//! - Directive: `{name argument/}`, name lowercased and argument trimmed
//!
//! The brace escape `{{/}` becomes a literal `{` here; everything else keeps
//! its raw source, so concatenating raw token text reconstructs the template.
//!
//! A placeholder whose name resolves to nothing stays literal, and scanning
//! resumes one byte past its opening `#` so the trailing `#` can open the
//! next candidate. `#A##B#` with only `B` bound therefore renders `#A#`
//! followed by the bound value.

use std::sync::LazyLock;

use regex::Regex;

/// Matches a placeholder or a directive. A directive body may not contain a
/// raw `/}` and may not span a newline.
static SCAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Z0-9_$]+)#|\{(\{|!|[a-zA-Z]+)([^\n]*?)/\}").unwrap());

/// Placeholder-only variant, used when directive parsing is disabled.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Z0-9_$]+)#").unwrap());

/// Matches a data substitution: `&NAME.`, `&NAME%prop.`, `&"quoted name".`,
/// each with an optional `!FILTER`.
pub(crate) static SUBST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"&(?:"([^"&\n]+)"|([A-Z0-9_$#]+(?:%[A-Za-z_]+)?))(?:!([A-Z]+))?\."#).unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Text(String),
    /// `#NAME#` with the value captured at tokenize time, not deferred.
    Placeholder { raw: String, value: String },
    Directive {
        raw: String,
        name: String,
        argument: String,
    },
}

impl Token {
    /// Source text this token contributes when replayed verbatim.
    pub(crate) fn raw(&self) -> &str {
        match self {
            Token::Text(text) => text,
            Token::Placeholder { raw, .. } => raw,
            Token::Directive { raw, .. } => raw,
        }
    }
}

/// Tokenizes `src`. `resolve` answers placeholder lookups (call arguments
/// take priority over the placeholder map); returning `None` leaves the
/// placeholder as literal text.
pub(crate) fn tokenize(
    src: &str,
    directives: bool,
    resolve: &dyn Fn(&str) -> Option<String>,
) -> Vec<Token> {
    let scan: &Regex = if directives { &SCAN_RE } else { &PLACEHOLDER_RE };
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut pos = 0;

    while let Some(caps) = scan.captures_at(src, pos) {
        let m = caps.get(0).unwrap();
        text.push_str(&src[pos..m.start()]);
        if let Some(name) = caps.get(1) {
            match resolve(name.as_str()) {
                Some(value) => {
                    flush_text(&mut tokens, &mut text);
                    tokens.push(Token::Placeholder {
                        raw: m.as_str().to_string(),
                        value,
                    });
                    pos = m.end();
                }
                None => {
                    // unresolved: the delimiters stay literal and the
                    // trailing '#' may open the next placeholder
                    text.push('#');
                    pos = m.start() + 1;
                }
            }
        } else {
            let name = caps.get(2).unwrap().as_str();
            if name == "{" {
                // brace escape {{/}
                text.push('{');
                pos = m.end();
                continue;
            }
            flush_text(&mut tokens, &mut text);
            tokens.push(Token::Directive {
                raw: m.as_str().to_string(),
                name: name.to_lowercase(),
                argument: caps.get(3).unwrap().as_str().trim().to_string(),
            });
            pos = m.end();
        }
    }
    text.push_str(&src[pos..]);
    flush_text(&mut tokens, &mut text);
    tokens
}

fn flush_text(tokens: &mut Vec<Token>, text: &mut String) {
    if !text.is_empty() {
        tokens.push(Token::Text(std::mem::take(text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn none(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn plain_text_is_one_token() {
        let tokens = tokenize("hello world", true, &none);
        assert_eq!(tokens, vec![Token::Text("hello world".to_string())]);
    }

    #[test]
    fn directives_are_parsed() {
        let tokens = tokenize("a{if P1/}b{endif/}c", true, &none);
        assert_eq!(tokens.len(), 5);
        assert_eq!(
            tokens[1],
            Token::Directive {
                raw: "{if P1/}".to_string(),
                name: "if".to_string(),
                argument: "P1".to_string(),
            }
        );
        assert_eq!(
            tokens[3],
            Token::Directive {
                raw: "{endif/}".to_string(),
                name: "endif".to_string(),
                argument: String::new(),
            }
        );
    }

    #[test]
    fn directive_name_is_lowercased() {
        let tokens = tokenize("{If P1/}", true, &none);
        assert_eq!(
            tokens[0],
            Token::Directive {
                raw: "{If P1/}".to_string(),
                name: "if".to_string(),
                argument: "P1".to_string(),
            }
        );
    }

    #[test]
    fn comment_directive() {
        let tokens = tokenize("{!just a note/}", true, &none);
        assert_eq!(
            tokens[0],
            Token::Directive {
                raw: "{!just a note/}".to_string(),
                name: "!".to_string(),
                argument: "just a note".to_string(),
            }
        );
    }

    #[test]
    fn brace_escape_becomes_literal_brace() {
        let tokens = tokenize("a{{/}if b", true, &none);
        assert_eq!(tokens, vec![Token::Text("a{if b".to_string())]);
    }

    #[test]
    fn directive_cannot_span_newline() {
        let tokens = tokenize("{if P1\n/}", true, &none);
        assert_eq!(tokens, vec![Token::Text("{if P1\n/}".to_string())]);
    }

    #[test]
    fn malformed_directive_stays_literal() {
        let tokens = tokenize("{if P1}", true, &none);
        assert_eq!(tokens, vec![Token::Text("{if P1}".to_string())]);
    }

    #[test]
    fn resolved_placeholder_captures_value() {
        let resolve = |name: &str| (name == "X").then(|| "hi".to_string());
        let tokens = tokenize("say #X#!", true, &resolve);
        assert_eq!(
            tokens,
            vec![
                Token::Text("say ".to_string()),
                Token::Placeholder {
                    raw: "#X#".to_string(),
                    value: "hi".to_string(),
                },
                Token::Text("!".to_string()),
            ]
        );
    }

    #[test]
    fn unresolved_placeholder_stays_literal() {
        let tokens = tokenize("#Y#", true, &none);
        assert_eq!(tokens, vec![Token::Text("#Y#".to_string())]);
    }

    #[test]
    fn unresolved_placeholder_backtracks_one_char() {
        // the trailing '#' of the unresolved #A# opens the #B# match
        let resolve = |name: &str| (name == "B").then(|| "b".to_string());
        let tokens = tokenize("#A#B#", true, &resolve);
        assert_eq!(
            tokens,
            vec![
                Token::Text("#A".to_string()),
                Token::Placeholder {
                    raw: "#B#".to_string(),
                    value: "b".to_string(),
                },
            ]
        );
    }

    #[test]
    fn directives_disabled_skips_directive_parsing() {
        let tokens = tokenize("{if P1/}x{endif/}", false, &none);
        assert_eq!(tokens, vec![Token::Text("{if P1/}x{endif/}".to_string())]);
    }

    #[test]
    fn raw_concatenation_reconstructs_source() {
        let src = "a{if P1/}#X#{endif/}b";
        let resolve = |name: &str| (name == "X").then(|| "hi".to_string());
        let tokens = tokenize(src, true, &resolve);
        let rebuilt: String = tokens.iter().map(Token::raw).collect();
        assert_eq!(rebuilt, src);
    }

    #[test]
    fn substitution_regex_matches_forms() {
        let caps = SUBST_RE.captures("&P1.").unwrap();
        assert_eq!(caps.get(2).unwrap().as_str(), "P1");
        let caps = SUBST_RE.captures("&\"My Col\".").unwrap();
        assert_eq!(caps.get(1).unwrap().as_str(), "My Col");
        let caps = SUBST_RE.captures("&P1!RAW.").unwrap();
        assert_eq!(caps.get(3).unwrap().as_str(), "RAW");
        let caps = SUBST_RE.captures("&COL%label.").unwrap();
        assert_eq!(caps.get(2).unwrap().as_str(), "COL%label");
    }
}
