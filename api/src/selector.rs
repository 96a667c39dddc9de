use crate::errors::Error;

use serde::Serialize;
use serde::Serializer;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

static NO_LABELS: BTreeMap<String, String> = BTreeMap::new();

/*
 * A single clause of a label selector, e.g. `env in (prod,staging)`.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Exists(String),
    DoesNotExist(String),
    Equal(String, String),
    NotEqual(String, String),
    In(String, BTreeSet<String>),
    NotIn(String, BTreeSet<String>),
    GreaterThan(String, i64),
    LessThan(String, i64),
}

impl Requirement {

    pub fn key(&self) -> &str {
	match self {
	    Requirement::Exists(key)
		| Requirement::DoesNotExist(key)
		| Requirement::Equal(key, _)
		| Requirement::NotEqual(key, _)
		| Requirement::In(key, _)
		| Requirement::NotIn(key, _)
		| Requirement::GreaterThan(key, _)
		| Requirement::LessThan(key, _) => key,
	}
    }

    /*
     * Note that the negative forms (`!=`, `notin`) also match when the
     * label is not set at all.
     */
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
	let value = labels.get(self.key());

	match self {
	    Requirement::Exists(_) => value.is_some(),
	    Requirement::DoesNotExist(_) => value.is_none(),
	    Requirement::Equal(_, expected) => value == Some(expected),
	    Requirement::NotEqual(_, expected) => value != Some(expected),
	    Requirement::In(_, values) => value.map_or(false, |v| values.contains(v)),
	    Requirement::NotIn(_, values) => value.map_or(true, |v| !values.contains(v)),
	    Requirement::GreaterThan(_, bound) => integer_label(value).map_or(false, |v| v > *bound),
	    Requirement::LessThan(_, bound) => integer_label(value).map_or(false, |v| v < *bound),
	}
    }
}

fn integer_label(value: Option<&String>) -> Option<i64> {
    value.and_then(|v| v.parse::<i64>().ok())
}

fn join_values(values: &BTreeSet<String>) -> String {
    values.iter().map(String::as_str).collect::<Vec<&str>>().join(",")
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	match self {
	    Requirement::Exists(key) => write!(f, "{}", key),
	    Requirement::DoesNotExist(key) => write!(f, "!{}", key),
	    Requirement::Equal(key, value) => write!(f, "{}={}", key, value),
	    Requirement::NotEqual(key, value) => write!(f, "{}!={}", key, value),
	    Requirement::In(key, values) => write!(f, "{} in ({})", key, join_values(values)),
	    Requirement::NotIn(key, values) => write!(f, "{} notin ({})", key, join_values(values)),
	    Requirement::GreaterThan(key, bound) => write!(f, "{}>{}", key, bound),
	    Requirement::LessThan(key, bound) => write!(f, "{}<{}", key, bound),
	}
    }
}

/*
 * LabelSelector is the parsed form of a kubernetes label selector string.
 *
 * An empty selector matches everything. The Display form is canonical
 * (requirements sorted by key) and is what we send to the API server.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {

    pub fn everything() -> Self {
	Self::default()
    }

    pub fn parse(selector: &str) -> Result<Self, Error> {
	let to_error = |reason: String| Error::Selector {
	    selector: selector.to_string(),
	    reason: reason,
	};

	let tokens = tokenize(selector).map_err(to_error)?;
	let mut requirements = Parser::new(tokens).parse().map_err(to_error)?;
	requirements.sort_by(|a, b| a.key().cmp(b.key()));

	Ok(Self{
	    requirements: requirements,
	})
    }

    pub fn is_empty(&self) -> bool {
	self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
	&self.requirements
    }

    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
	let labels = labels.unwrap_or(&NO_LABELS);
	self.requirements.iter().all(|req| req.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	let clauses: Vec<String> = self.requirements.iter().map(|req| req.to_string()).collect();
	write!(f, "{}", clauses.join(","))
    }
}

impl FromStr for LabelSelector {
    type Err = Error;

    fn from_str(selector: &str) -> Result<Self, Self::Err> {
	Self::parse(selector)
    }
}

impl Serialize for LabelSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Not,
    Equals,
    DoubleEquals,
    NotEquals,
    In,
    NotIn,
    GreaterThan,
    LessThan,
    OpenParen,
    CloseParen,
    Comma,
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '!' | '=' | '<' | '>' | '(' | ')' | ',')
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
	if c.is_whitespace() {
	    chars.next();
	    continue;
	}

	if !is_operator_char(c) {
	    let mut ident = String::new();
	    while let Some(&c) = chars.peek() {
		if c.is_whitespace() || is_operator_char(c) {
		    break;
		}
		ident.push(c);
		chars.next();
	    }

	    tokens.push(match ident.as_str() {
		"in" => Token::In,
		"notin" => Token::NotIn,
		_ => Token::Ident(ident),
	    });
	    continue;
	}

	chars.next();
	let token = match c {
	    '!' if chars.peek() == Some(&'=') => {
		chars.next();
		Token::NotEquals
	    },
	    '!' => Token::Not,
	    '=' if chars.peek() == Some(&'=') => {
		chars.next();
		Token::DoubleEquals
	    },
	    '=' => Token::Equals,
	    '<' => Token::LessThan,
	    '>' => Token::GreaterThan,
	    '(' => Token::OpenParen,
	    ')' => Token::CloseParen,
	    ',' => Token::Comma,
	    other => return Err(format!("unexpected character '{}'", other)),
	};
	tokens.push(token);
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {

    fn new(tokens: Vec<Token>) -> Self {
	Self{
	    tokens: tokens,
	    pos: 0,
	}
    }

    fn peek(&self) -> Option<&Token> {
	self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
	let token = self.tokens.get(self.pos).cloned();
	self.pos += 1;
	token
    }

    fn parse(mut self) -> Result<Vec<Requirement>, String> {
	let mut requirements = Vec::new();
	if self.tokens.is_empty() {
	    return Ok(requirements);
	}

	loop {
	    requirements.push(self.requirement()?);
	    match self.advance() {
		None => break,
		Some(Token::Comma) => continue,
		Some(token) => return Err(format!("expected ',' but got {:?}", token)),
	    }
	}

	Ok(requirements)
    }

    fn requirement(&mut self) -> Result<Requirement, String> {
	if self.peek() == Some(&Token::Not) {
	    self.advance();
	    return Ok(Requirement::DoesNotExist(self.key()?));
	}

	let key = self.key()?;
	let requirement = match self.peek() {
	    None | Some(Token::Comma) => Requirement::Exists(key),
	    Some(Token::Equals) | Some(Token::DoubleEquals) => {
		self.advance();
		Requirement::Equal(key, self.value()?)
	    },
	    Some(Token::NotEquals) => {
		self.advance();
		Requirement::NotEqual(key, self.value()?)
	    },
	    Some(Token::In) => {
		self.advance();
		Requirement::In(key, self.values()?)
	    },
	    Some(Token::NotIn) => {
		self.advance();
		Requirement::NotIn(key, self.values()?)
	    },
	    Some(Token::GreaterThan) => {
		self.advance();
		Requirement::GreaterThan(key, self.integer()?)
	    },
	    Some(Token::LessThan) => {
		self.advance();
		Requirement::LessThan(key, self.integer()?)
	    },
	    Some(token) => return Err(format!("unexpected {:?} after key '{}'", token, key)),
	};

	Ok(requirement)
    }

    fn key(&mut self) -> Result<String, String> {
	match self.advance() {
	    Some(Token::Ident(key)) => {
		validate_key(&key)?;
		Ok(key)
	    },
	    Some(token) => Err(format!("expected a label key but got {:?}", token)),
	    None => Err(String::from("expected a label key but reached the end")),
	}
    }

    /* `key=` with nothing after it selects the empty value */
    fn value(&mut self) -> Result<String, String> {
	match self.peek() {
	    None | Some(Token::Comma) | Some(Token::CloseParen) => Ok(String::new()),
	    Some(Token::Ident(_)) => match self.advance() {
		Some(Token::Ident(value)) => {
		    validate_value(&value)?;
		    Ok(value)
		},
		_ => Err(String::from("expected a label value")),
	    },
	    Some(token) => Err(format!("expected a label value but got {:?}", token)),
	}
    }

    fn values(&mut self) -> Result<BTreeSet<String>, String> {
	match self.advance() {
	    Some(Token::OpenParen) => {},
	    other => return Err(format!("expected '(' but got {:?}", other)),
	}

	let mut values = BTreeSet::new();
	loop {
	    values.insert(self.value()?);
	    match self.advance() {
		Some(Token::Comma) => continue,
		Some(Token::CloseParen) => break,
		other => return Err(format!("expected ',' or ')' but got {:?}", other)),
	    }
	}

	Ok(values)
    }

    fn integer(&mut self) -> Result<i64, String> {
	match self.advance() {
	    Some(Token::Ident(value)) => value.parse::<i64>()
		.map_err(|_| format!("'{}' is not an integer", value)),
	    other => Err(format!("expected an integer but got {:?}", other)),
	}
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
}

/*
 * Validates the name part of a qualified name, which is also the rule for
 * non-empty label values: at most 63 chars, alphanumeric at both ends.
 */
fn validate_name(name: &str) -> Result<(), String> {
    let starts_ok = name.chars().next().map_or(false, |c| c.is_ascii_alphanumeric());
    let ends_ok = name.chars().last().map_or(false, |c| c.is_ascii_alphanumeric());

    if name.len() > 63 || !starts_ok || !ends_ok || !name.chars().all(is_name_char) {
	return Err(format!("'{}' must be 63 characters or less, begin and end with an alphanumeric character and contain only [-_.A-Za-z0-9]", name));
    }
    Ok(())
}

fn validate_prefix(prefix: &str) -> Result<(), String> {
    let valid = !prefix.is_empty()
	&& prefix.len() <= 253
	&& prefix.split('.').all(|part| {
	    !part.is_empty()
		&& !part.starts_with('-')
		&& !part.ends_with('-')
		&& part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
	});

    if !valid {
	return Err(format!("prefix '{}' must be a lowercase DNS subdomain", prefix));
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<(), String> {
    match key.split_once('/') {
	Some((prefix, name)) => {
	    validate_prefix(prefix)?;
	    validate_name(name)
	},
	None => validate_name(key),
    }
}

fn validate_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
	return Ok(());
    }
    validate_name(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
	pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn empty_selector_matches_everything() {
	let selector = LabelSelector::parse("").unwrap();

	assert!(selector.is_empty());
	assert_eq!(selector, LabelSelector::everything());
	assert!(selector.matches(None));
	assert!(selector.matches(Some(&labels(&[("team", "a")]))));
	assert_eq!(selector.to_string(), "");
    }

    #[test]
    fn parses_every_operator() {
	let selector = LabelSelector::parse("a, !b, c=1, d==2, e!=3, f in (x, y), g notin (z), h>5, i<7").unwrap();

	assert_eq!(selector.requirements(), &[
	    Requirement::Exists("a".into()),
	    Requirement::DoesNotExist("b".into()),
	    Requirement::Equal("c".into(), "1".into()),
	    Requirement::Equal("d".into(), "2".into()),
	    Requirement::NotEqual("e".into(), "3".into()),
	    Requirement::In("f".into(), ["x".to_string(), "y".to_string()].into()),
	    Requirement::NotIn("g".into(), ["z".to_string()].into()),
	    Requirement::GreaterThan("h".into(), 5),
	    Requirement::LessThan("i".into(), 7),
	]);
    }

    #[test]
    fn canonical_form_is_sorted() {
	let selector = LabelSelector::parse("tier in (web,api), env==prod,!legacy").unwrap();

	assert_eq!(selector.to_string(), "env=prod,!legacy,tier in (api,web)");
	assert_eq!(LabelSelector::parse(&selector.to_string()).unwrap(), selector);
    }

    #[test]
    fn prefixed_keys() {
	let selector = LabelSelector::parse("kubesphere.io/workspace=system-workspace").unwrap();

	assert!(selector.matches(Some(&labels(&[("kubesphere.io/workspace", "system-workspace")]))));
	assert!(!selector.matches(Some(&labels(&[("workspace", "system-workspace")]))));
    }

    #[test]
    fn matching_semantics() {
	let ns = labels(&[("env", "prod"), ("replicas", "3")]);
	let check = |s: &str| LabelSelector::parse(s).unwrap().matches(Some(&ns));

	assert!(check("env"));
	assert!(!check("!env"));
	assert!(check("env=prod"));
	assert!(!check("env=dev"));
	assert!(check("env!=dev"));
	assert!(check("owner!=me"));
	assert!(check("env in (dev,prod)"));
	assert!(!check("owner in (me)"));
	assert!(check("owner notin (me)"));
	assert!(!check("env notin (prod)"));
	assert!(check("replicas>2"));
	assert!(!check("replicas<3"));
	assert!(!check("env>1"));
	assert!(check("env=prod,replicas<10"));
	assert!(!check("env=prod,owner"));
    }

    #[test]
    fn empty_value() {
	let selector = LabelSelector::parse("env=").unwrap();

	assert!(selector.matches(Some(&labels(&[("env", "")]))));
	assert!(!selector.matches(Some(&labels(&[("env", "prod")]))));
    }

    #[test]
    fn rejects_malformed_selectors() {
	for bad in ["=value", "env in prod", "env in (a b)", "env==prod extra", "-bad=1",
		    "env=-x", "Bad.Prefix/name", "size>big", "a,,b", "!", "env in (a"] {
	    let err = LabelSelector::parse(bad).unwrap_err();
	    match err {
		Error::Selector { selector, .. } => assert_eq!(selector, bad),
		other => panic!("unexpected error {:?}", other),
	    }
	}
    }

    #[test]
    fn serializes_as_canonical_string() {
	let selector: LabelSelector = "b=2,a=1".parse().unwrap();

	assert_eq!(serde_json::to_string(&selector).unwrap(), "\"a=1,b=2\"");
    }
}
