//! Selector AST and its parsers.
//!
//! A selector arrives as a string (`"@cluster(name, @data_center.name)"`), an
//! array of selectors, or an explicit object (`{"ref": "cluster"}` /
//! `{"many_ref": "vm", "where": ..}`). All three forms parse into the same
//! [`Selector`] tree.
//!
//! String grammar:
//!
//! ```text
//! selector  := '*' | field | ref | manyref
//! ref       := '@' ident ( '.' selector | '(' items ')' )?
//! manyref   := '@[' ident ']' ( '.' selector | '(' items ')' )?
//! items     := selector ( ',' selector )*
//! ident     := ( letter | digit | [_$:-] )+
//! ```

use std::fmt;

use serde_json::{Map, Value};

use crate::request::CollectionScope;
use crate::{QueryError, QueryResult};

/// Parsed selection expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Every field of the entity.
    Wildcard,
    /// One plain field.
    Field(String),
    /// Single reference into `target`. `sub: None` embeds the full document.
    Ref {
        target: String,
        sub: Option<Box<Selector>>,
    },
    /// Multi reference into `target`, with its own filtering and pagination.
    ManyRef {
        target: String,
        sub: Option<Box<Selector>>,
        scope: CollectionScope,
    },
    /// Several selectors applied to the same entity.
    List(Vec<Selector>),
}

impl Selector {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    /// Reference embedding the full target document.
    pub fn reference(target: impl Into<String>) -> Self {
        Self::Ref {
            target: target.into(),
            sub: None,
        }
    }

    /// Multi reference embedding full target documents, unscoped.
    pub fn many(target: impl Into<String>) -> Self {
        Self::ManyRef {
            target: target.into(),
            sub: None,
            scope: CollectionScope::default(),
        }
    }

    /// Parses the string form.
    pub fn parse(input: &str) -> QueryResult<Self> {
        let mut parser = Parser::new(input);
        let selector = parser.selector()?;
        parser.skip_whitespace();
        if !parser.at_end() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(selector)
    }

    /// Parses any of the string, array or object forms.
    pub fn from_value(value: &Value) -> QueryResult<Self> {
        Self::from_value_with(value, &Self::parse)
    }

    pub(crate) fn from_value_with<F>(value: &Value, parse: &F) -> QueryResult<Self>
    where
        F: Fn(&str) -> QueryResult<Selector>,
    {
        match value {
            Value::String(raw) => parse(raw),
            Value::Array(items) => {
                let mut flat = Vec::with_capacity(items.len());
                flatten_into(items, parse, &mut flat)?;
                Ok(Self::List(flat))
            }
            Value::Object(object) => Self::from_object(object, parse),
            other => Err(QueryError::bad_selector(
                other.to_string(),
                "selector must be a string, array or object",
            )),
        }
    }

    fn from_object<F>(object: &Map<String, Value>, parse: &F) -> QueryResult<Self>
    where
        F: Fn(&str) -> QueryResult<Selector>,
    {
        let fragment = || Value::Object(object.clone()).to_string();
        let sub = match object.get("select") {
            None | Some(Value::Null) => None,
            Some(select) => Some(Box::new(Self::from_value_with(select, parse)?)),
        };

        match (object.get("ref"), object.get("many_ref")) {
            (Some(Value::String(target)), None) => Ok(Self::Ref {
                target: target.clone(),
                sub,
            }),
            (None, Some(Value::String(target))) => Ok(Self::ManyRef {
                target: target.clone(),
                sub,
                scope: CollectionScope::from_object(object)?,
            }),
            (None, None) => Err(QueryError::bad_selector(
                fragment(),
                "no 'ref' or 'many_ref' specified in nested object",
            )),
            (Some(_), Some(_)) => Err(QueryError::bad_selector(
                fragment(),
                "'ref' and 'many_ref' are mutually exclusive",
            )),
            _ => Err(QueryError::bad_selector(
                fragment(),
                "reference target must be a string",
            )),
        }
    }
}

fn flatten_into<F>(items: &[Value], parse: &F, out: &mut Vec<Selector>) -> QueryResult<()>
where
    F: Fn(&str) -> QueryResult<Selector>,
{
    for item in items {
        match item {
            Value::Array(nested) => flatten_into(nested, parse, out)?,
            other => out.push(Selector::from_value_with(other, parse)?),
        }
    }
    Ok(())
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn sub(f: &mut fmt::Formatter<'_>, sub: &Option<Box<Selector>>) -> fmt::Result {
            match sub.as_deref() {
                None => Ok(()),
                Some(Selector::List(items)) => {
                    f.write_str("(")?;
                    write_items(f, items)?;
                    f.write_str(")")
                }
                Some(other) => write!(f, ".{other}"),
            }
        }

        fn write_items(f: &mut fmt::Formatter<'_>, items: &[Selector]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        }

        match self {
            Self::Wildcard => f.write_str("*"),
            Self::Field(name) => f.write_str(name),
            Self::Ref { target, sub: s } => {
                write!(f, "@{target}")?;
                sub(f, s)
            }
            Self::ManyRef { target, sub: s, .. } => {
                write!(f, "@[{target}]")?;
                sub(f, s)
            }
            Self::List(items) => write_items(f, items),
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> QueryResult<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, reason: &str) -> QueryError {
        let fragment = if self.at_end() {
            self.input
        } else {
            self.rest()
        };
        QueryError::bad_selector(fragment, format!("{reason} at offset {}", self.pos))
    }

    fn selector(&mut self) -> QueryResult<Selector> {
        self.skip_whitespace();
        match self.peek() {
            Some('*') => {
                self.bump();
                Ok(Selector::Wildcard)
            }
            Some('@') => self.reference(),
            _ => self.ident().map(Selector::Field),
        }
    }

    fn reference(&mut self) -> QueryResult<Selector> {
        self.expect('@')?;
        let many = self.eat('[');
        let target = self.ident()?;
        if many {
            self.expect(']')?;
        }

        let sub = if self.eat('.') {
            Some(Box::new(self.selector()?))
        } else if self.eat('(') {
            Some(Box::new(Selector::List(self.items()?)))
        } else {
            None
        };

        Ok(if many {
            Selector::ManyRef {
                target,
                sub,
                scope: CollectionScope::default(),
            }
        } else {
            Selector::Ref { target, sub }
        })
    }

    fn items(&mut self) -> QueryResult<Vec<Selector>> {
        let mut items = vec![self.selector()?];
        loop {
            self.skip_whitespace();
            if self.eat(',') {
                items.push(self.selector()?);
            } else if self.eat(')') {
                return Ok(items);
            } else {
                return Err(self.error("expected ',' or ')'"));
            }
        }
    }

    fn ident(&mut self) -> QueryResult<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || "_-$:".contains(c))
        {
            self.bump();
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(self.input[start..self.pos].to_string())
    }
}
