//! Interpreter for the key-condition and `SET` update forms the in-memory
//! store understands.
//!
//! Supported key conditions are conjunctions (`AND`) of:
//! - `attr = :v`, `attr < :v`, `attr <= :v`, `attr > :v`, `attr >= :v`
//! - `attr BETWEEN :lo AND :hi`
//! - `begins_with(attr, :prefix)`
//!
//! Attribute names may be `#placeholders` resolved through the request's names.

use std::cmp::Ordering;
use std::collections::HashMap;

use ddbgate_core::{AttributeValue, Item};

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
}

fn invalid(expression: &str, reason: &str) -> StoreError {
    StoreError::InvalidData(format!("Unsupported expression '{expression}': {reason}"))
}

fn tokenize(expression: &str) -> StoreResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ',' => tokens.push(Token::Comma),
            '=' => tokens.push(Token::Op(CompareOp::Eq)),
            '<' if chars.peek() == Some(&'=') => {
                chars.next();
                tokens.push(Token::Op(CompareOp::Le));
            }
            '<' => tokens.push(Token::Op(CompareOp::Lt)),
            '>' if chars.peek() == Some(&'=') => {
                chars.next();
                tokens.push(Token::Op(CompareOp::Ge));
            }
            '>' => tokens.push(Token::Op(CompareOp::Gt)),
            c if is_word_char(c) => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !is_word_char(next) {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
            other => return Err(invalid(expression, &format!("unexpected character '{other}'"))),
        }
    }

    Ok(tokens)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '#' | ':' | '_' | '-' | '.')
}

/// Orders two scalar values of the same type. Mixed types are unordered.
pub fn compare_scalar(a: &AttributeValue, b: &AttributeValue) -> Option<Ordering> {
    match (a, b) {
        (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.cmp(b)),
        (AttributeValue::B(a), AttributeValue::B(b)) => Some(a.cmp(b)),
        (AttributeValue::N(a), AttributeValue::N(b)) => {
            let a: f64 = a.parse().ok()?;
            let b: f64 = b.parse().ok()?;
            a.partial_cmp(&b)
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Compare {
        attribute: String,
        op: CompareOp,
        value: AttributeValue,
    },
    Between {
        attribute: String,
        low: AttributeValue,
        high: AttributeValue,
    },
    BeginsWith {
        attribute: String,
        prefix: AttributeValue,
    },
}

impl Predicate {
    fn holds_for(&self, item: &Item) -> bool {
        match self {
            Predicate::Compare {
                attribute,
                op,
                value,
            } => item
                .get(attribute)
                .and_then(|stored| compare_scalar(stored, value))
                .is_some_and(|ordering| op.holds(ordering)),
            Predicate::Between {
                attribute,
                low,
                high,
            } => item.get(attribute).is_some_and(|stored| {
                compare_scalar(stored, low).is_some_and(|o| o != Ordering::Less)
                    && compare_scalar(stored, high).is_some_and(|o| o != Ordering::Greater)
            }),
            Predicate::BeginsWith { attribute, prefix } => {
                match (item.get(attribute), prefix) {
                    (Some(AttributeValue::S(s)), AttributeValue::S(p)) => s.starts_with(p.as_str()),
                    (Some(AttributeValue::B(b)), AttributeValue::B(p)) => b.starts_with(p),
                    _ => false,
                }
            }
        }
    }
}

/// Resolves `#name` and `:value` placeholders while parsing.
struct Parser<'a> {
    expression: &'a str,
    tokens: std::vec::IntoIter<Token>,
    names: &'a HashMap<String, String>,
    values: &'a Item,
}

impl<'a> Parser<'a> {
    fn new(
        expression: &'a str,
        names: &'a HashMap<String, String>,
        values: &'a Item,
    ) -> StoreResult<Self> {
        Ok(Self {
            expression,
            tokens: tokenize(expression)?.into_iter(),
            names,
            values,
        })
    }

    fn error(&self, reason: &str) -> StoreError {
        invalid(self.expression, reason)
    }

    fn expect(&mut self, expected: Token) -> StoreResult<()> {
        match self.tokens.next() {
            Some(token) if token == expected => Ok(()),
            _ => Err(self.error(&format!("expected {:?}", expected))),
        }
    }

    fn word(&mut self) -> StoreResult<String> {
        match self.tokens.next() {
            Some(Token::Word(word)) => Ok(word),
            _ => Err(self.error("expected a name or placeholder")),
        }
    }

    fn attribute(&mut self) -> StoreResult<String> {
        let word = self.word()?;
        self.resolve_name(word)
    }

    fn resolve_name(&self, word: String) -> StoreResult<String> {
        if word.starts_with('#') {
            return self
                .names
                .get(&word)
                .cloned()
                .ok_or_else(|| self.error(&format!("undefined name placeholder {word}")));
        }
        Ok(word)
    }

    fn value(&mut self) -> StoreResult<AttributeValue> {
        let word = self.word()?;
        if !word.starts_with(':') {
            return Err(self.error(&format!("expected a value placeholder, found {word}")));
        }
        self.values
            .get(&word)
            .cloned()
            .ok_or_else(|| self.error(&format!("undefined value placeholder {word}")))
    }

    fn predicate(&mut self) -> StoreResult<Predicate> {
        let word = self.word()?;

        if word.eq_ignore_ascii_case("begins_with") {
            self.expect(Token::LParen)?;
            let attribute = self.attribute()?;
            self.expect(Token::Comma)?;
            let prefix = self.value()?;
            self.expect(Token::RParen)?;
            return Ok(Predicate::BeginsWith { attribute, prefix });
        }

        let attribute = self.resolve_name(word)?;
        match self.tokens.next() {
            Some(Token::Op(op)) => Ok(Predicate::Compare {
                attribute,
                op,
                value: self.value()?,
            }),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("between") => {
                let low = self.value()?;
                match self.word()? {
                    and if and.eq_ignore_ascii_case("and") => {}
                    _ => return Err(self.error("expected AND inside BETWEEN")),
                }
                let high = self.value()?;
                Ok(Predicate::Between {
                    attribute,
                    low,
                    high,
                })
            }
            _ => Err(self.error("expected a comparison, BETWEEN or begins_with")),
        }
    }
}

/// A parsed key condition.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    predicates: Vec<Predicate>,
}

impl KeyCondition {
    pub fn parse(
        expression: &str,
        names: &HashMap<String, String>,
        values: &Item,
    ) -> StoreResult<Self> {
        let mut parser = Parser::new(expression, names, values)?;
        let mut predicates = vec![parser.predicate()?];

        loop {
            match parser.tokens.next() {
                None => break,
                Some(Token::Word(w)) if w.eq_ignore_ascii_case("and") => {
                    predicates.push(parser.predicate()?);
                }
                Some(_) => return Err(parser.error("expected AND between conditions")),
            }
        }

        Ok(Self { predicates })
    }

    pub fn matches(&self, item: &Item) -> bool {
        self.predicates.iter().all(|p| p.holds_for(item))
    }
}

/// Parses `SET a = :v, #b = :w` into attribute/value assignments.
pub fn parse_set_update(
    expression: &str,
    names: &HashMap<String, String>,
    values: &Item,
) -> StoreResult<Vec<(String, AttributeValue)>> {
    let mut parser = Parser::new(expression, names, values)?;
    match parser.word()? {
        set if set.eq_ignore_ascii_case("set") => {}
        _ => return Err(parser.error("only SET updates are supported")),
    }

    let mut assignments = Vec::new();
    loop {
        let attribute = parser.attribute()?;
        parser.expect(Token::Op(CompareOp::Eq))?;
        assignments.push((attribute, parser.value()?));

        match parser.tokens.next() {
            None => break,
            Some(Token::Comma) => {}
            Some(_) => return Err(parser.error("expected ',' between assignments")),
        }
    }

    Ok(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> AttributeValue {
        AttributeValue::S(v.to_string())
    }

    fn row(pk: &str, sk: &str) -> Item {
        Item::from([("PK".to_string(), s(pk)), ("SK".to_string(), s(sk))])
    }

    fn values(pairs: &[(&str, AttributeValue)]) -> Item {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_partition_equality() {
        let cond = KeyCondition::parse(
            "PK = :pk",
            &HashMap::new(),
            &values(&[(":pk", s("GROUP#DEV"))]),
        )
        .unwrap();

        assert!(cond.matches(&row("GROUP#DEV", "USER#1")));
        assert!(!cond.matches(&row("GROUP#OPS", "USER#1")));
    }

    #[test]
    fn test_begins_with_and_name_placeholders() {
        let names = HashMap::from([("#sk".to_string(), "SK".to_string())]);
        let cond = KeyCondition::parse(
            "PK = :pk AND begins_with(#sk, :prefix)",
            &names,
            &values(&[(":pk", s("GROUP#DEV")), (":prefix", s("USER#"))]),
        )
        .unwrap();

        assert!(cond.matches(&row("GROUP#DEV", "USER#2")));
        assert!(!cond.matches(&row("GROUP#DEV", "#PROFILE")));
    }

    #[test]
    fn test_between_and_comparisons() {
        let vals = values(&[
            (":pk", s("GROUP#DEV")),
            (":lo", s("USER#2")),
            (":hi", s("USER#3")),
        ]);
        let between =
            KeyCondition::parse("PK = :pk AND SK BETWEEN :lo AND :hi", &HashMap::new(), &vals)
                .unwrap();
        assert!(!between.matches(&row("GROUP#DEV", "USER#1")));
        assert!(between.matches(&row("GROUP#DEV", "USER#2")));
        assert!(between.matches(&row("GROUP#DEV", "USER#3")));

        let greater = KeyCondition::parse("PK = :pk AND SK > :lo", &HashMap::new(), &vals).unwrap();
        assert!(greater.matches(&row("GROUP#DEV", "USER#3")));
        assert!(!greater.matches(&row("GROUP#DEV", "USER#2")));
    }

    #[test]
    fn test_numeric_comparison() {
        let item = Item::from([
            ("PK".to_string(), s("A")),
            ("Seq".to_string(), AttributeValue::N("10".to_string())),
        ]);
        let cond = KeyCondition::parse(
            "PK = :pk AND Seq >= :n",
            &HashMap::new(),
            &values(&[(":pk", s("A")), (":n", AttributeValue::N("9".to_string()))]),
        )
        .unwrap();
        assert!(cond.matches(&item));
    }

    #[test]
    fn test_undefined_placeholders_fail() {
        assert!(KeyCondition::parse("PK = :pk", &HashMap::new(), &Item::new()).is_err());
        assert!(KeyCondition::parse("#pk = :pk", &HashMap::new(), &values(&[(":pk", s("x"))]))
            .is_err());
        assert!(KeyCondition::parse("PK ~ :pk", &HashMap::new(), &Item::new()).is_err());
    }

    #[test]
    fn test_parse_set_update() {
        let names = HashMap::from([
            ("#f1".to_string(), "bb".to_string()),
            ("#f2".to_string(), "cc".to_string()),
        ]);
        let vals = values(&[
            (":v1", AttributeValue::Bool(false)),
            (":v2", AttributeValue::N("3".to_string())),
        ]);

        let assignments = parse_set_update("SET #f1 = :v1, #f2 = :v2", &names, &vals).unwrap();
        assert_eq!(
            assignments,
            vec![
                ("bb".to_string(), AttributeValue::Bool(false)),
                ("cc".to_string(), AttributeValue::N("3".to_string())),
            ]
        );

        assert!(parse_set_update("REMOVE #f1", &names, &vals).is_err());
    }

    #[test]
    fn test_compare_scalar_mixed_types() {
        assert_eq!(compare_scalar(&s("1"), &AttributeValue::N("1".to_string())), None);
        assert_eq!(
            compare_scalar(
                &AttributeValue::N("2".to_string()),
                &AttributeValue::N("10".to_string())
            ),
            Some(Ordering::Less)
        );
    }
}
