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

//! Directive interpretation
//!
//! A stack machine over the token list. A single forward cursor walks the
//! tokens; each directive handler receives the current index and returns the
//! index to resume from, which is how "skip ahead to the matching
//! else/endif/endcase/endloop" works without re-tokenizing. Skip helpers
//! count same-construct nesting so a nested `if` inside a skipped branch
//! cannot terminate the outer search early.
//!
//! Loop bodies are replayed by resetting the cursor to the body start once
//! per iteration. Loop-local pseudo-variables (`APEX$I`, `APEX$ITEM`,
//! `APEX$ID`) live in a scope stack pushed around each iteration, so nested
//! loops over different sources never clobber an outer loop's counters.
//!
//! Mismatched or mis-ordered directives are reported and skipped, never
//! fatal; the engine always produces some output for arbitrary input.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::data::ItemValue;
use crate::engine::Engine;
use crate::error::{Diagnostic, Result, TemplateError};
use crate::escape::EscapeFilter;
use crate::options::{ApplyOptions, DataSource};
use crate::tokenizer::{tokenize, Token, SUBST_RE};

/// Ceiling on nested engine invocations (`apply`, `with` value rendering).
/// A named template that applies itself hits this instead of the call stack.
pub(crate) const MAX_APPLY_DEPTH: usize = 50;

/// 1-based position counter exposed inside loop bodies.
pub(crate) const LOOP_INDEX: &str = "APEX$I";
/// Current element value inside scalar-list loop bodies.
pub(crate) const LOOP_ITEM: &str = "APEX$ITEM";
/// Current record id inside tree-mode loop bodies.
pub(crate) const LOOP_ID: &str = "APEX$ID";

static ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([A-Z0-9_$]+)\s*:=").unwrap());

#[derive(Debug, Clone, Copy)]
pub(crate) struct IfFrame {
    matched: bool,
    has_else: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct CaseFrame {
    value: String,
    matched: bool,
    has_otherwise: bool,
}

pub(crate) struct LoopFrame;

pub(crate) struct Interpreter<'e> {
    pub(crate) engine: &'e Engine,
    pub(crate) opts: &'e ApplyOptions,
    pub(crate) tokens: Vec<Token>,
    pub(crate) out: String,
    pub(crate) if_stack: Vec<IfFrame>,
    pub(crate) case_stack: Vec<CaseFrame>,
    pub(crate) loop_stack: Vec<LoopFrame>,
    /// Call-time arguments from a with/apply invocation.
    pub(crate) args: HashMap<String, String>,
    /// Loop-local substitution scopes, innermost last.
    pub(crate) scopes: Vec<HashMap<String, String>>,
    /// Loop-pushed (model, record) contexts, innermost last.
    pub(crate) model_frames: Vec<DataSource>,
    pub(crate) diags: &'e mut Vec<Diagnostic>,
    pub(crate) depth: usize,
}

impl<'e> Interpreter<'e> {
    /// Runs one engine invocation over `template` and returns the output
    /// before script stripping.
    pub(crate) fn render(
        engine: &Engine,
        template: &str,
        opts: &ApplyOptions,
        args: HashMap<String, String>,
        depth: usize,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<String> {
        Self::render_with_context(engine, template, opts, args, Vec::new(), Vec::new(), depth, diags)
    }

    /// Re-entry point for nested invocations (`apply`, `with` value
    /// rendering, link-text evaluation), which inherit the caller's loop
    /// scopes and record contexts so loop-local pseudo-variables stay
    /// visible inside them.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn render_with_context(
        engine: &Engine,
        template: &str,
        opts: &ApplyOptions,
        args: HashMap<String, String>,
        scopes: Vec<HashMap<String, String>>,
        model_frames: Vec<DataSource>,
        depth: usize,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<String> {
        if depth > MAX_APPLY_DEPTH {
            return Err(TemplateError::RecursionLimit(MAX_APPLY_DEPTH));
        }
        // cheap path: no directives, no placeholders, no argument context
        if !(opts.directives || opts.placeholders.is_some() || !args.is_empty()) {
            return Ok(template.to_string());
        }
        let resolve = |name: &str| -> Option<String> {
            if let Some(value) = args.get(name) {
                return Some(value.clone());
            }
            opts.placeholders
                .as_ref()
                .and_then(|map| map.get(name).cloned())
        };
        let tokens = tokenize(template, opts.directives, &resolve);
        let mut interp = Interpreter {
            engine,
            opts,
            tokens,
            out: String::new(),
            if_stack: Vec::new(),
            case_stack: Vec::new(),
            loop_stack: Vec::new(),
            args,
            scopes,
            model_frames,
            diags,
            depth,
        };
        let mut index = 0;
        while index < interp.tokens.len() {
            index = interp.process_token(index)?;
        }
        interp.finish();
        Ok(interp.out)
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.diags.push(Diagnostic::warning(message));
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{message}");
        self.diags.push(Diagnostic::error(message));
    }

    fn finish(&mut self) {
        if !(self.if_stack.is_empty() && self.case_stack.is_empty() && self.loop_stack.is_empty())
        {
            self.error(format!(
                "unclosed directives at end of template: {} if, {} case, {} loop",
                self.if_stack.len(),
                self.case_stack.len(),
                self.loop_stack.len()
            ));
        }
    }

    /// Processes the token at `index`, returning the index to resume from.
    fn process_token(&mut self, index: usize) -> Result<usize> {
        match self.tokens[index].clone() {
            Token::Text(text) => {
                let substituted = self.substitute(&text)?;
                self.out.push_str(&substituted);
                Ok(index + 1)
            }
            Token::Placeholder { value, .. } => {
                self.out.push_str(&value);
                Ok(index + 1)
            }
            Token::Directive {
                name,
                argument,
                raw,
            } => self.directive(index, &name, &argument, &raw),
        }
    }

    fn directive(&mut self, index: usize, name: &str, argument: &str, raw: &str) -> Result<usize> {
        Ok(match name {
            "if" => self.directive_if(index, argument),
            "elseif" => self.directive_elseif(index, argument),
            "else" => self.directive_else(index),
            "endif" => self.directive_endif(index),
            "case" => self.directive_case(index, argument),
            "when" => self.directive_when(index, argument),
            "otherwise" => self.directive_otherwise(index),
            "endcase" => self.directive_endcase(index),
            "loop" => return self.directive_loop(index, argument),
            "endloop" => self.directive_endloop(index),
            "with" => return self.directive_with(index, argument),
            "apply" => return self.directive_apply(index, argument),
            "!" => index + 1,
            _ => {
                // unknown word: not part of the directive grammar, keep literal
                self.out.push_str(raw);
                index + 1
            }
        })
    }

    /// Replaces `&NAME.` style data substitutions in literal text.
    fn substitute(&mut self, text: &str) -> Result<String> {
        if !SUBST_RE.is_match(text) {
            return Ok(text.to_string());
        }
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let matches: Vec<(usize, usize, String, Option<String>)> = SUBST_RE
            .captures_iter(text)
            .map(|caps| {
                let m = caps.get(0).unwrap();
                let name = match caps.get(1) {
                    Some(quoted) => quoted.as_str().to_string(),
                    None => caps.get(2).unwrap().as_str().to_string(),
                };
                let filter = caps.get(3).map(|f| f.as_str().to_string());
                (m.start(), m.end(), name, filter)
            })
            .collect();
        for (start, end, name, filter) in matches {
            out.push_str(&text[last..start]);
            let filter = match filter {
                Some(name) => Some(EscapeFilter::from_str(&name)?),
                None => None,
            };
            let value = self.string_value(&name, filter);
            out.push_str(&value);
            last = end;
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    fn directive_if(&mut self, index: usize, argument: &str) -> usize {
        let (negate, name) = parse_condition(argument);
        if invalid_name(name) {
            self.error(format!("invalid name in if: \"{name}\""));
            self.if_stack.push(IfFrame {
                matched: true,
                has_else: false,
            });
            return self.skip_if_branch(index);
        }
        let matched = self.is_truthy(name) != negate;
        self.if_stack.push(IfFrame {
            matched,
            has_else: false,
        });
        if matched {
            index + 1
        } else {
            self.skip_if_branch(index)
        }
    }

    fn directive_elseif(&mut self, index: usize, argument: &str) -> usize {
        let Some(frame) = self.if_stack.last().copied() else {
            self.error("elseif without if");
            return index + 1;
        };
        if frame.has_else {
            self.error("elseif after else");
        }
        if frame.matched {
            return self.skip_if_branch(index);
        }
        let (negate, name) = parse_condition(argument);
        if invalid_name(name) {
            self.error(format!("invalid name in elseif: \"{name}\""));
            self.if_stack.last_mut().unwrap().matched = true;
            return self.skip_if_branch(index);
        }
        if self.is_truthy(name) != negate {
            self.if_stack.last_mut().unwrap().matched = true;
            index + 1
        } else {
            self.skip_if_branch(index)
        }
    }

    fn directive_else(&mut self, index: usize) -> usize {
        let Some(frame) = self.if_stack.last().copied() else {
            self.error("else without if");
            return index + 1;
        };
        if frame.has_else {
            self.error("duplicate else");
        }
        self.if_stack.last_mut().unwrap().has_else = true;
        if frame.matched {
            self.skip_if_branch(index)
        } else {
            self.if_stack.last_mut().unwrap().matched = true;
            index + 1
        }
    }

    fn directive_endif(&mut self, index: usize) -> usize {
        if self.if_stack.pop().is_none() {
            self.error("endif without if");
        }
        index + 1
    }

    fn directive_case(&mut self, index: usize, argument: &str) -> usize {
        let name = argument.trim();
        if invalid_name(name) {
            self.error(format!("invalid name in case: \"{name}\""));
            self.case_stack.push(CaseFrame {
                value: String::new(),
                matched: true,
                has_otherwise: false,
            });
            return self.skip_case_branch(index);
        }
        let value = self.raw_string_value(name).trim().to_string();
        self.case_stack.push(CaseFrame {
            value,
            matched: false,
            has_otherwise: false,
        });
        if !self.next_non_blank_is_when(index) {
            self.error("case must be followed by when");
        }
        self.skip_case_branch(index)
    }

    fn directive_when(&mut self, index: usize, argument: &str) -> usize {
        let Some(frame) = self.case_stack.last().cloned() else {
            self.error("when without case");
            return index + 1;
        };
        if frame.has_otherwise {
            self.error("when after otherwise");
        }
        if frame.matched {
            return self.skip_case_branch(index);
        }
        if frame.value == argument.trim() {
            self.case_stack.last_mut().unwrap().matched = true;
            index + 1
        } else {
            self.skip_case_branch(index)
        }
    }

    fn directive_otherwise(&mut self, index: usize) -> usize {
        let Some(frame) = self.case_stack.last().cloned() else {
            self.error("otherwise without case");
            return index + 1;
        };
        if frame.has_otherwise {
            self.error("duplicate otherwise");
        }
        self.case_stack.last_mut().unwrap().has_otherwise = true;
        if frame.matched {
            self.skip_case_branch(index)
        } else {
            self.case_stack.last_mut().unwrap().matched = true;
            index + 1
        }
    }

    fn directive_endcase(&mut self, index: usize) -> usize {
        if self.case_stack.pop().is_none() {
            self.error("endcase without case");
        }
        index + 1
    }

    fn directive_loop(&mut self, index: usize, argument: &str) -> Result<usize> {
        let body_start = index + 1;
        let end = self.find_matching_endloop(body_start);
        let (separator, name) = parse_loop_arg(argument);

        enum Iteration {
            Scalar(String),
            Record(String),
        }

        let iterations: Vec<Iteration> = if let Some(model) = self.engine.models().model(&name) {
            // tree mode: iterate the registered data source's records
            let mut ids = Vec::new();
            model.for_each(&mut |_, id| ids.push(id.to_string()));
            ids.into_iter().map(Iteration::Record).collect()
        } else {
            let lookup = self.lookup(&name);
            let values = match lookup.value {
                Some(ItemValue::Multi(values)) => values,
                Some(ItemValue::Single(value)) if !value.is_empty() => {
                    let separator = separator
                        .or(lookup.separator)
                        .unwrap_or_else(|| ":".to_string());
                    split_list(&value, &separator)
                }
                _ => Vec::new(),
            };
            values.into_iter().map(Iteration::Scalar).collect()
        };

        self.loop_stack.push(LoopFrame);
        let Some(end) = end else {
            // unterminated: process the body once, imbalance reported at the end
            return Ok(body_start);
        };

        for (i, iteration) in iterations.into_iter().enumerate() {
            let mut scope = HashMap::new();
            scope.insert(LOOP_INDEX.to_string(), (i + 1).to_string());
            let pushed_record = match iteration {
                Iteration::Scalar(value) => {
                    scope.insert(LOOP_ITEM.to_string(), value);
                    false
                }
                Iteration::Record(id) => {
                    scope.insert(LOOP_ID.to_string(), id.clone());
                    self.model_frames.push(DataSource {
                        model: name.clone(),
                        record_id: id,
                    });
                    true
                }
            };
            self.scopes.push(scope);
            let mut cursor = body_start;
            while cursor < end {
                cursor = self.process_token(cursor)?;
            }
            self.scopes.pop();
            if pushed_record {
                self.model_frames.pop();
            }
        }
        self.loop_stack.pop();
        Ok(end + 1)
    }

    fn directive_endloop(&mut self, index: usize) -> usize {
        if self.loop_stack.pop().is_none() {
            self.error("endloop without loop");
        }
        index + 1
    }

    fn directive_with(&mut self, index: usize, argument: &str) -> Result<usize> {
        let mut text = String::new();
        if !argument.is_empty() {
            text.push_str(argument);
            text.push('\n');
        }
        let mut i = index + 1;
        let mut depth = 0usize;
        let found = loop {
            if i >= self.tokens.len() {
                break None;
            }
            match &self.tokens[i] {
                Token::Directive { name, raw, .. } if name == "with" => {
                    depth += 1;
                    text.push_str(raw);
                }
                Token::Directive {
                    name,
                    argument,
                    raw,
                } if name == "apply" => {
                    if depth == 0 {
                        break Some((i, argument.clone()));
                    }
                    depth -= 1;
                    text.push_str(raw);
                }
                Token::Placeholder { value, .. } => text.push_str(value),
                token => text.push_str(token.raw()),
            }
            i += 1;
        };
        let Some((apply_index, template_name)) = found else {
            self.error("with without matching apply");
            return Ok(self.tokens.len());
        };

        let mut bound = HashMap::new();
        for (name, value_text) in parse_with_assignments(&text) {
            // each value is template text in its own right
            let value = Interpreter::render_with_context(
                self.engine,
                value_text.trim(),
                self.opts,
                self.args.clone(),
                self.scopes.clone(),
                self.model_frames.clone(),
                self.depth + 1,
                &mut *self.diags,
            )?;
            bound.insert(name, value);
        }
        self.apply_named(&template_name, bound)?;
        Ok(apply_index + 1)
    }

    fn directive_apply(&mut self, index: usize, argument: &str) -> Result<usize> {
        self.apply_named(argument, HashMap::new())?;
        Ok(index + 1)
    }

    /// Renders a named template with the caller's arguments merged under the
    /// just-bound ones, appending the result to the output.
    fn apply_named(&mut self, name: &str, bound: HashMap<String, String>) -> Result<()> {
        let key = name.trim().to_uppercase();
        let Some(text) = self.engine.get_template(&key).map(str::to_string) else {
            self.warn(format!("unknown template \"{}\" in apply", name.trim()));
            return Ok(());
        };
        let mut args = self.args.clone();
        args.extend(bound);
        let rendered = Interpreter::render_with_context(
            self.engine,
            &text,
            self.opts,
            args,
            self.scopes.clone(),
            self.model_frames.clone(),
            self.depth + 1,
            &mut *self.diags,
        )?;
        self.out.push_str(&rendered);
        Ok(())
    }

    /// Index of the next sibling `elseif`/`else`/`endif`, tracking nested
    /// if/endif pairs.
    fn skip_if_branch(&self, index: usize) -> usize {
        let mut depth = 0usize;
        let mut i = index + 1;
        while i < self.tokens.len() {
            if let Token::Directive { name, .. } = &self.tokens[i] {
                match name.as_str() {
                    "if" => depth += 1,
                    "endif" if depth == 0 => return i,
                    "endif" => depth -= 1,
                    "elseif" | "else" if depth == 0 => return i,
                    _ => {}
                }
            }
            i += 1;
        }
        i
    }

    /// Index of the next sibling `when`/`otherwise`/`endcase`.
    fn skip_case_branch(&self, index: usize) -> usize {
        let mut depth = 0usize;
        let mut i = index + 1;
        while i < self.tokens.len() {
            if let Token::Directive { name, .. } = &self.tokens[i] {
                match name.as_str() {
                    "case" => depth += 1,
                    "endcase" if depth == 0 => return i,
                    "endcase" => depth -= 1,
                    "when" | "otherwise" if depth == 0 => return i,
                    _ => {}
                }
            }
            i += 1;
        }
        i
    }

    fn find_matching_endloop(&self, from: usize) -> Option<usize> {
        let mut depth = 0usize;
        for i in from..self.tokens.len() {
            if let Token::Directive { name, .. } = &self.tokens[i] {
                match name.as_str() {
                    "loop" => depth += 1,
                    "endloop" if depth == 0 => return Some(i),
                    "endloop" => depth -= 1,
                    _ => {}
                }
            }
        }
        None
    }

    fn next_non_blank_is_when(&self, index: usize) -> bool {
        for token in &self.tokens[index + 1..] {
            match token {
                Token::Text(text) if text.trim().is_empty() => continue,
                Token::Directive { name, .. } => return name == "when",
                _ => return false,
            }
        }
        false
    }
}

fn parse_condition(argument: &str) -> (bool, &str) {
    let argument = argument.trim();
    match argument.strip_prefix('!') {
        Some(rest) => (true, rest.trim()),
        None => (false, argument),
    }
}

/// Names containing `&` or line breaks cannot be item or column references.
fn invalid_name(name: &str) -> bool {
    name.contains('&') || name.contains('\r') || name.contains('\n')
}

/// Splits a loop argument into an optional quoted separator and the source
/// name: `"sep" NAME` or just `NAME`.
fn parse_loop_arg(argument: &str) -> (Option<String>, String) {
    let argument = argument.trim();
    if let Some(rest) = argument.strip_prefix('"') {
        if let Some(end) = rest.find('"') {
            return (
                Some(rest[..end].to_string()),
                rest[end + 1..].trim().to_string(),
            );
        }
    }
    (None, argument.to_string())
}

/// A separator longer than one character is treated as a regular expression.
fn split_list(value: &str, separator: &str) -> Vec<String> {
    if separator.chars().count() > 1 {
        if let Ok(re) = Regex::new(separator) {
            return re.split(value).map(str::to_string).collect();
        }
    }
    value.split(separator).map(str::to_string).collect()
}

/// Parses `NAME := VALUE` assignments, ignoring matches inside nested
/// with/apply blocks (depth counted on the literal `{with` / `{apply`
/// substrings so inner blocks are not mis-parsed as argument boundaries).
fn parse_with_assignments(text: &str) -> Vec<(String, String)> {
    let mut marks: Vec<(usize, usize, String)> = Vec::new();
    for caps in ASSIGN_RE.captures_iter(text) {
        let m = caps.get(0).unwrap();
        let prefix = &text[..m.start()];
        let depth =
            prefix.matches("{with").count() as isize - prefix.matches("{apply").count() as isize;
        if depth == 0 {
            marks.push((m.start(), m.end(), caps[1].to_string()));
        }
    }
    let mut out = Vec::new();
    for (i, (_, end, name)) in marks.iter().enumerate() {
        let value_end = marks.get(i + 1).map(|(s, _, _)| *s).unwrap_or(text.len());
        out.push((name.clone(), text[*end..value_end].to_string()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_negation_is_stripped() {
        assert_eq!(parse_condition("P1"), (false, "P1"));
        assert_eq!(parse_condition("!P1"), (true, "P1"));
        assert_eq!(parse_condition("! P1"), (true, "P1"));
    }

    #[test]
    fn loop_arg_separator_forms() {
        assert_eq!(parse_loop_arg("P1"), (None, "P1".to_string()));
        assert_eq!(
            parse_loop_arg("\",\" P1"),
            (Some(",".to_string()), "P1".to_string())
        );
    }

    #[test]
    fn multi_char_separator_is_a_regex() {
        assert_eq!(split_list("a1b22c", "[0-9]+"), vec!["a", "b", "c"]);
        assert_eq!(split_list("a:b", ":"), vec!["a", "b"]);
    }

    #[test]
    fn with_assignments_are_split_at_depth_zero() {
        let parsed = parse_with_assignments("A:= one\nB:= two");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].0, "A");
        assert_eq!(parsed[0].1.trim(), "one");
        assert_eq!(parsed[1].0, "B");
        assert_eq!(parsed[1].1.trim(), "two");
    }

    #[test]
    fn nested_with_blocks_do_not_split_assignments() {
        let parsed =
            parse_with_assignments("A:= {with/}X:= inner{apply T2/} tail\nB:= two");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].0, "A");
        assert!(parsed[0].1.contains("X:= inner"));
        assert_eq!(parsed[1].0, "B");
    }
}
