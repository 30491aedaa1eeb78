//! Feature and scenario parser
//!
//! Two layers:
//! - [`parse_feature`] / [`parse_scenarios`] split a document into scenarios
//!   with their tags and kind (plain, outline, permutations).
//! - [`compose`] turns one scenario's step lines into GIVEN / WHEN / THEN
//!   clauses, each a boolean tree of step lines:
//!   - `given`, `when`, `then` open a clause (repeating one extends it with AND)
//!   - `and` / `or` combine with the clause so far
//!   - `but` combines with AND, negating the new step
//!   - a line without a keyword continues the clause with AND
//!   - `#` and `//` lines are comments
//!
//! Leaves keep the step line as written; they are resolved against the live
//! context only when evaluated, because earlier steps may change context.

use std::fmt;

use crate::error::SpecError;
use crate::expr::Expr;
use crate::tags::extract_tags;

/// How a scenario's text becomes concrete scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScenarioKind {
    #[default]
    Plain,
    /// One scenario per examples row
    Outline,
    /// One scenario per combination of examples column values
    Permutations,
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScenarioKind::Plain => "Scenario",
            ScenarioKind::Outline => "Scenario Outline",
            ScenarioKind::Permutations => "Scenario Permutations",
        })
    }
}

/// A parsed scenario
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scenario {
    pub name: String,
    /// Step lines, trimmed
    pub text: String,
    pub kind: ScenarioKind,
    /// The scenario's own `@tags`
    pub tags: Vec<String>,
    /// The tag line(s) as written
    pub tag_expression: Option<String>,
    /// Line of the header (1-based)
    pub line: usize,
}

/// A parsed feature
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Feature {
    pub name: String,
    /// Description lines under the header
    pub text: String,
    pub tags: Vec<String>,
    pub tag_expression: Option<String>,
    pub scenarios: Vec<Scenario>,
}

/// Header prefixes, longest first
const SCENARIO_HEADERS: [(&str, ScenarioKind); 4] = [
    ("scenario outline:", ScenarioKind::Outline),
    ("scenario template:", ScenarioKind::Outline),
    ("scenario permutations:", ScenarioKind::Permutations),
    ("scenario:", ScenarioKind::Plain),
];

const FEATURE_HEADER: &str = "feature:";

/// Case-insensitive prefix strip returning the trimmed remainder.
fn strip_header<'a>(line: &'a str, header: &str) -> Option<&'a str> {
    let head = line.get(..header.len())?;
    head.eq_ignore_ascii_case(header)
        .then(|| line[header.len()..].trim())
}

fn scenario_header(line: &str) -> Option<(ScenarioKind, &str)> {
    SCENARIO_HEADERS
        .iter()
        .find_map(|(header, kind)| strip_header(line, header).map(|name| (*kind, name)))
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with("//")
}

/// Tags collected from tag lines, waiting for the header they precede
#[derive(Default)]
struct PendingTags {
    tags: Vec<String>,
    lines: Vec<String>,
    line: usize,
}

impl PendingTags {
    fn push(&mut self, line: &str, line_number: usize) {
        if self.lines.is_empty() {
            self.line = line_number;
        }
        self.tags.extend(extract_tags(line));
        self.lines.push(line.to_string());
    }

    fn take(&mut self) -> (Vec<String>, Option<String>) {
        let expression = (!self.lines.is_empty()).then(|| self.lines.join(" "));
        self.lines.clear();
        (std::mem::take(&mut self.tags), expression)
    }

    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Trim surrounding blank lines and join.
fn finish_text(lines: &[&str]) -> String {
    let start = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !l.is_empty()).map_or(start, |e| e + 1);
    lines[start..end].join("\n")
}

/// Parse scenario blocks from `lines`, starting at `offset` (0-based).
fn parse_blocks(lines: &[&str], offset: usize, mut pending: PendingTags) -> Result<Vec<Scenario>, SpecError> {
    let mut scenarios: Vec<Scenario> = Vec::new();
    let mut body: Vec<&str> = Vec::new();

    for (i, raw) in lines.iter().enumerate() {
        let line_number = offset + i + 1;
        let line = raw.trim();

        if line.starts_with('@') {
            pending.push(line, line_number);
            continue;
        }
        if let Some((kind, name)) = scenario_header(line) {
            if let Some(last) = scenarios.last_mut() {
                last.text = finish_text(&body);
            }
            body.clear();
            let (tags, tag_expression) = pending.take();
            scenarios.push(Scenario {
                name: name.to_string(),
                text: String::new(),
                kind,
                tags,
                tag_expression,
                line: line_number,
            });
            continue;
        }
        if strip_header(line, FEATURE_HEADER).is_some() {
            return Err(SpecError::syntax("unexpected Feature: header").with_location("feature", line_number));
        }
        if !pending.is_empty() && !line.is_empty() && !is_comment(line) {
            return Err(SpecError::syntax("tags must precede a scenario header")
                .with_location("feature", pending.line));
        }
        if scenarios.is_empty() {
            if line.is_empty() || is_comment(line) {
                continue;
            }
            return Err(SpecError::syntax(format!("step outside of a scenario: '{}'", line))
                .with_location("feature", line_number));
        }
        body.push(line);
    }

    if !pending.is_empty() {
        return Err(SpecError::syntax("tags must precede a scenario header").with_location("feature", pending.line));
    }
    match scenarios.last_mut() {
        Some(last) => last.text = finish_text(&body),
        None => return Err(SpecError::syntax("no scenarios found")),
    }
    Ok(scenarios)
}

/// Parse a document made only of scenarios.
pub fn parse_scenarios(text: &str) -> Result<Vec<Scenario>, SpecError> {
    let lines: Vec<&str> = text.lines().collect();
    parse_blocks(&lines, 0, PendingTags::default())
}

/// Parse a feature document.
pub fn parse_feature(text: &str) -> Result<Feature, SpecError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut pending = PendingTags::default();
    let mut feature = Feature::default();

    let mut index = 0;
    let mut found = false;
    while index < lines.len() {
        let line = lines[index].trim();
        index += 1;
        if line.is_empty() || is_comment(line) {
            continue;
        }
        if line.starts_with('@') {
            pending.push(line, index);
            continue;
        }
        match strip_header(line, FEATURE_HEADER) {
            Some(name) => {
                feature.name = name.to_string();
                let (tags, tag_expression) = pending.take();
                feature.tags = tags;
                feature.tag_expression = tag_expression;
                found = true;
                break;
            }
            None => {
                return Err(SpecError::syntax(format!("expected Feature: header, found '{}'", line))
                    .with_location("feature", index));
            }
        }
    }
    if !found {
        return Err(SpecError::syntax("no Feature: header"));
    }

    let mut description = Vec::new();
    while index < lines.len() {
        let line = lines[index].trim();
        if line.starts_with('@') || scenario_header(line).is_some() {
            break;
        }
        if !line.is_empty() && !is_comment(line) {
            description.push(line);
        }
        index += 1;
    }
    feature.text = description.join("\n");
    feature.scenarios = parse_blocks(&lines[index..], index, PendingTags::default())?;
    Ok(feature)
}

/// Leading keyword of a step line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Given,
    When,
    Then,
    And,
    Or,
    But,
}

impl Keyword {
    fn of(line: &str) -> Option<Self> {
        let word = line.split_whitespace().next()?;
        match word.to_ascii_lowercase().as_str() {
            "given" => Some(Keyword::Given),
            "when" => Some(Keyword::When),
            "then" => Some(Keyword::Then),
            "and" => Some(Keyword::And),
            "or" => Some(Keyword::Or),
            "but" => Some(Keyword::But),
            _ => None,
        }
    }
}

/// One GIVEN / WHEN / THEN clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// Step lines in order
    pub lines: Vec<String>,
    pub expr: Expr<String>,
}

impl Clause {
    fn new(line: &str) -> Self {
        Self {
            lines: vec![line.to_string()],
            expr: Expr::leaf(line.to_string()),
        }
    }

    fn extend(&mut self, keyword: Option<Keyword>, line: &str) {
        let leaf = Expr::leaf(line.to_string());
        let expr = std::mem::replace(&mut self.expr, Expr::leaf(String::new()));
        self.expr = match keyword {
            Some(Keyword::Or) => expr.or(leaf),
            Some(Keyword::But) => expr.but(leaf),
            _ => expr.and(leaf),
        };
        self.lines.push(line.to_string());
    }

    /// The clause as written, one step per line
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// A scenario's steps composed into clauses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedScenario {
    pub given: Clause,
    pub when: Option<Clause>,
    pub then: Clause,
}

/// Compose step lines into clauses.
pub fn compose(text: &str) -> Result<ComposedScenario, SpecError> {
    let mut given: Option<Clause> = None;
    let mut when: Option<Clause> = None;
    let mut then: Option<Clause> = None;
    let mut current: Option<Keyword> = None;

    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || is_comment(line) {
            continue;
        }
        let keyword = Keyword::of(line);
        let slot = match keyword {
            Some(k @ (Keyword::Given | Keyword::When | Keyword::Then)) => {
                current = Some(k);
                match k {
                    Keyword::Given => &mut given,
                    Keyword::When => &mut when,
                    _ => &mut then,
                }
            }
            _ => match current {
                Some(Keyword::Given) => &mut given,
                Some(Keyword::When) => &mut when,
                Some(_) => &mut then,
                None => {
                    return Err(SpecError::syntax(format!(
                        "'{}' does not follow a Given, When or Then step",
                        line
                    ))
                    .with_location("scenario", i + 1));
                }
            },
        };
        match slot {
            Some(clause) => clause.extend(keyword, line),
            None => *slot = Some(Clause::new(line)),
        }
    }

    let given = given.ok_or_else(|| SpecError::missing_clause("GIVEN"))?;
    let then = then.ok_or_else(|| SpecError::missing_clause("THEN"))?;
    Ok(ComposedScenario { given, when, then })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const FEATURE: &str = "\
# Login flows
@auth
Feature: Login
  Users sign in from the home screen.

  @smoke
  Scenario: Sign in
    Given the Home screen is displayed
    When I tap Log in
    Then the Login screen is displayed

  @slow @auth-extra
  Scenario Outline: Visit screens
    Given the <screen> screen is displayed
    Then the <screen> screen is displayed
    Examples:
    | screen |
    | Home   |

  Scenario Permutations: Many
    Given <a>
    Then <b>
    | a | b |
    | 1 | 2 |
";

    #[test]
    fn test_parse_feature() {
        let feature = parse_feature(FEATURE).unwrap();
        assert_eq!(feature.name, "Login");
        assert_eq!(feature.text, "Users sign in from the home screen.");
        assert_eq!(feature.tags, vec!["@auth"]);
        assert_eq!(feature.scenarios.len(), 3);

        let first = &feature.scenarios[0];
        assert_eq!(first.name, "Sign in");
        assert_eq!(first.kind, ScenarioKind::Plain);
        assert_eq!(first.tags, vec!["@smoke"]);
        assert_eq!(first.line, 7);
        assert_eq!(
            first.text,
            "Given the Home screen is displayed\nWhen I tap Log in\nThen the Login screen is displayed"
        );

        let second = &feature.scenarios[1];
        assert_eq!(second.kind, ScenarioKind::Outline);
        assert_eq!(second.tags, vec!["@slow", "@auth-extra"]);
        assert_eq!(second.tag_expression.as_deref(), Some("@slow @auth-extra"));
        assert!(second.text.ends_with("| Home   |"));

        assert_eq!(feature.scenarios[2].kind, ScenarioKind::Permutations);
        assert!(feature.scenarios[2].tags.is_empty());
    }

    #[test]
    fn test_parse_scenarios() {
        let text = "Scenario: A\nGiven x\nThen y\n\nScenario Template: B\nGiven <x>\nThen y\n| x |\n| 1 |";
        let scenarios = parse_scenarios(text).unwrap();
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].text, "Given x\nThen y");
        assert_eq!(scenarios[1].kind, ScenarioKind::Outline);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_feature("Scenario: x\nGiven y").unwrap_err().kind, ErrorKind::SyntaxError);
        assert_eq!(parse_feature("Feature: empty\n").unwrap_err().kind, ErrorKind::SyntaxError);
        assert_eq!(parse_scenarios("Given y").unwrap_err().kind, ErrorKind::SyntaxError);
        assert_eq!(parse_scenarios("Scenario: x\nGiven y\n@dangling").unwrap_err().kind, ErrorKind::SyntaxError);
    }

    fn leaves(clause: &Clause) -> Vec<&str> {
        clause.expr.leaves().into_iter().map(String::as_str).collect()
    }

    #[test]
    fn test_compose_clauses() {
        let composed = compose("Given a\nAnd b\nWhen c\nThen d\nOr e\nBut f").unwrap();
        assert_eq!(leaves(&composed.given), vec!["Given a", "And b"]);
        assert_eq!(leaves(composed.when.as_ref().unwrap()), vec!["When c"]);
        assert_eq!(composed.then.text(), "Then d\nOr e\nBut f");

        let expected = Expr::leaf("Then d".to_string())
            .or(Expr::leaf("Or e".to_string()))
            .and(Expr::leaf("But f".to_string()).not());
        assert_eq!(composed.then.expr, expected);
    }

    #[test]
    fn test_compose_repeated_keyword_and_continuation() {
        let composed = compose("Given a\nGiven b\n  c\n# comment\nThen d").unwrap();
        assert_eq!(leaves(&composed.given), vec!["Given a", "Given b", "c"]);
        assert!(composed.when.is_none());
    }

    #[test]
    fn test_compose_missing_clauses() {
        let err = compose("When a\nThen b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingClause);
        assert!(err.message.contains("GIVEN"));
        let err = compose("Given a\nWhen b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingClause);
        assert!(err.message.contains("THEN"));
    }

    #[test]
    fn test_compose_conjunction_first_is_error() {
        let err = compose("And a\nGiven b\nThen c").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn test_keyword_is_whole_word() {
        assert_eq!(Keyword::of("Andrew is here"), None);
        assert_eq!(Keyword::of("GIVEN x"), Some(Keyword::Given));
    }
}
