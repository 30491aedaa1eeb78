//! Tag expressions
//!
//! A tag expression gates which scenarios run, e.g.
//! `@smoke and not (@slow or @flaky)`. Supported tokens are `@tag`, `and`,
//! `but` (a synonym for `and`, so `@a but not @b` reads naturally), `or`,
//! `not` and parentheses.
//!
//! Compilation works in two passes. Parenthesized groups are cut out by
//! bracket matching and compiled recursively; the remaining text between
//! groups is compiled on its own, which leaves a flat sequence of compiled
//! expressions and `and`/`or` connectives. That sequence is folded left to
//! right into a single expression. Anything that does not reduce to exactly
//! one expression is rejected.
//!
//! Within a group-free stretch of text `or` binds loosest, then `and`/`but`,
//! then `not`.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::SpecError;
use crate::expr::Expr;

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"@[A-Za-z0-9_\-.:]+").expect("static tag regex"))
}

fn literal_tag_pattern() -> &'static Regex {
    static LITERAL: OnceLock<Regex> = OnceLock::new();
    LITERAL.get_or_init(|| Regex::new(r"^@[A-Za-z0-9_\-.:]+$").expect("static tag regex"))
}

/// Extract every `@tag` token in a line of text.
pub fn extract_tags(text: &str) -> Vec<String> {
    tag_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Whether `text` is a single well-formed tag.
pub fn is_tag(text: &str) -> bool {
    literal_tag_pattern().is_match(text)
}

/// Connective between two compiled expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connective {
    And,
    Or,
}

impl Connective {
    fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "and" | "but" => Some(Connective::And),
            "or" => Some(Connective::Or),
            _ => None,
        }
    }

    fn join(self, lhs: Expr<String>, rhs: Expr<String>) -> Expr<String> {
        match self {
            Connective::And => lhs.and(rhs),
            Connective::Or => lhs.or(rhs),
        }
    }
}

/// One element of the flattened sequence
#[derive(Debug)]
enum Item {
    Expr(Expr<String>),
    Connective(Connective),
}

/// A compiled tag expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagExpression {
    source: String,
    expr: Expr<String>,
}

impl TagExpression {
    /// Compile an expression, failing with `UnrecognizedTagExpression`.
    pub fn compile(source: &str) -> Result<Self, SpecError> {
        let expr = compile_complex(source)
            .ok_or_else(|| SpecError::unrecognized_tag_expression(source.trim()))?;
        Ok(Self {
            source: source.trim().to_string(),
            expr,
        })
    }

    /// The expression text as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a set of tags (membership test per literal).
    pub fn matches<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        let set: HashSet<&str> = tags.iter().map(|t| t.as_ref()).collect();
        self.expr.evaluate(&mut |tag| set.contains(tag.as_str()))
    }

    /// Tags mentioned by the expression, in order of appearance.
    pub fn tags(&self) -> Vec<&str> {
        self.expr.leaves().into_iter().map(String::as_str).collect()
    }
}

impl fmt::Display for TagExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compile an expression that may contain parenthesized groups.
fn compile_complex(expression: &str) -> Option<Expr<String>> {
    let mut items: Vec<Item> = Vec::new();
    let mut rest = expression;

    loop {
        let open = rest.find('(');
        let text = match open {
            Some(i) => &rest[..i],
            None => rest,
        };
        if text.contains(')') {
            return None;
        }
        let negate = push_text(&mut items, text, open.is_some())?;

        let Some(open) = open else {
            if negate {
                return None;
            }
            break;
        };
        let close = matching_paren(rest, open)?;
        let mut group = compile_complex(&rest[open + 1..close])?;
        if negate {
            group = group.not();
        }
        items.push(Item::Expr(group));
        rest = &rest[close + 1..];
    }

    fold(items)
}

/// Compile the text between groups into items.
///
/// Returns whether the text ended with `not`, which then applies to the
/// following group (only permitted when a group follows).
fn push_text(items: &mut Vec<Item>, text: &str, group_follows: bool) -> Option<bool> {
    let mut words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Some(false);
    }

    let mut leading = None;
    if let Some(c) = Connective::parse(words[0]) {
        leading = Some(c);
        words.remove(0);
    }

    let mut negate = false;
    let mut trailing = None;
    if group_follows {
        if words.last().map_or(false, |w| w.eq_ignore_ascii_case("not")) {
            negate = true;
            words.pop();
        }
        if let Some(c) = words.last().and_then(|w| Connective::parse(w)) {
            trailing = Some(c);
            words.pop();
        }
    }

    if let Some(c) = leading {
        items.push(Item::Connective(c));
    }
    if !words.is_empty() {
        let middle = words.join(" ");
        items.push(Item::Expr(compile_compound(&middle)?));
    }
    if let Some(c) = trailing {
        items.push(Item::Connective(c));
    }
    Some(negate)
}

/// Index of the parenthesis closing the one at `open`.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Fold the flat sequence left to right.
fn fold(items: Vec<Item>) -> Option<Expr<String>> {
    let mut stack: Vec<Expr<String>> = Vec::new();
    let mut pending: Option<Connective> = None;

    for item in items {
        match item {
            Item::Connective(c) => {
                if pending.is_some() || stack.is_empty() {
                    return None;
                }
                pending = Some(c);
            }
            Item::Expr(expr) => match pending.take() {
                Some(c) => {
                    let lhs = stack.pop()?;
                    stack.push(c.join(lhs, expr));
                }
                None if stack.is_empty() => stack.push(expr),
                None => return None,
            },
        }
    }

    if pending.is_some() || stack.len() != 1 {
        return None;
    }
    stack.pop()
}

/// Compile a group-free expression: a literal, a split on a connective, or a negation.
fn compile_compound(expression: &str) -> Option<Expr<String>> {
    let expression = expression.trim();
    if is_tag(expression) {
        return Some(Expr::leaf(expression.to_string()));
    }
    if let Some((lhs, rhs)) = split_once_word(expression, "or") {
        return Some(compile_compound(lhs)?.or(compile_compound(rhs)?));
    }
    for word in ["and", "but"] {
        if let Some((lhs, rhs)) = split_once_word(expression, word) {
            return Some(compile_compound(lhs)?.and(compile_compound(rhs)?));
        }
    }
    let lower = expression.to_ascii_lowercase();
    if lower.starts_with("not ") {
        return Some(compile_compound(&expression[4..])?.not());
    }
    None
}

/// Split on the first ` word ` (case-insensitive).
fn split_once_word<'a>(text: &'a str, word: &str) -> Option<(&'a str, &'a str)> {
    let needle = format!(" {} ", word);
    let lower = text.to_ascii_lowercase();
    let at = lower.find(&needle)?;
    Some((&text[..at], &text[at + needle.len()..]))
}
