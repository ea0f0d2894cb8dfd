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

//! Escape filters and output sanitization
//!
//! Resolved substitution values pass through a named filter before insertion
//! into the output:
//! - `HTML` / `ATTR` — entity-escape `& < > " ' /`
//! - `STRIPHTML` — remove tags, then entity-escape what remains
//! - `RAW` — no transformation
//!
//! Tag stripping and script stripping both loop until nothing matches: a
//! single pass over input like `<scr<script></script>ipt>` would reassemble a
//! tag from the pieces left behind.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::TemplateError;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").unwrap());

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script[^>]*>").unwrap());

/// A named transformation applied to a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapeFilter {
    #[default]
    Html,
    Attr,
    Raw,
    StripHtml,
}

impl FromStr for EscapeFilter {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HTML" => Ok(Self::Html),
            "ATTR" => Ok(Self::Attr),
            "RAW" => Ok(Self::Raw),
            "STRIPHTML" => Ok(Self::StripHtml),
            other => Err(TemplateError::InvalidEscapeFilter(other.to_string())),
        }
    }
}

/// Escapes `& < > " ' /` to their entity equivalents.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            c => out.push(c),
        }
    }
    out
}

/// Removes all `<...>` tag patterns, looping until no match remains.
pub fn strip_tags(value: &str) -> String {
    let mut current = value.to_string();
    while TAG_RE.is_match(&current) {
        current = TAG_RE.replace_all(&current, "").into_owned();
    }
    current
}

/// Removes `<script>...</script>` regions, looping until no match remains.
///
/// Applied to every output path regardless of filters; templates may come
/// from semi-trusted configuration but must never inject executable script.
pub fn strip_scripts(value: &str) -> String {
    let mut current = value.to_string();
    while SCRIPT_RE.is_match(&current) {
        current = SCRIPT_RE.replace_all(&current, "").into_owned();
    }
    current
}

pub(crate) fn apply_filter(value: &str, filter: EscapeFilter) -> String {
    match filter {
        EscapeFilter::Html | EscapeFilter::Attr => escape_html(value),
        EscapeFilter::Raw => value.to_string(),
        EscapeFilter::StripHtml => escape_html(&strip_tags(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escapes_all_six() {
        assert_eq!(
            escape_html(r#"&<>"'/"#),
            "&amp;&lt;&gt;&quot;&#x27;&#x2F;"
        );
    }

    #[test]
    fn raw_passes_through() {
        assert_eq!(apply_filter("<b>x</b>", EscapeFilter::Raw), "<b>x</b>");
    }

    #[test]
    fn striphtml_removes_tags_then_escapes() {
        assert_eq!(apply_filter("<b>x</b>", EscapeFilter::StripHtml), "x");
        assert_eq!(apply_filter("<b>a & b</b>", EscapeFilter::StripHtml), "a &amp; b");
    }

    #[test]
    fn striphtml_is_not_fooled_by_split_tags() {
        // removing the inner tag must not leave a new tag behind
        assert_eq!(strip_tags("a<<b>i>b"), "ab");
        assert_eq!(strip_tags("<x<y>z>"), "");
    }

    #[test]
    fn scripts_are_removed() {
        assert_eq!(strip_scripts("a<script>alert(1)</script>b"), "ab");
        assert_eq!(
            strip_scripts("a<script type=\"text/javascript\">x</script>b"),
            "ab"
        );
    }

    #[test]
    fn nested_scripts_are_removed() {
        let out = strip_scripts("<scr<script>x</script>ipt>alert(1)</scr</script>ipt>");
        assert!(!out.contains("<script"));
    }

    #[test]
    fn unknown_filter_is_an_error() {
        assert!(EscapeFilter::from_str("JS").is_err());
        assert!(EscapeFilter::from_str("html").is_err());
    }
}
