//! Query text parser
//!
//! Accepts the entity query subset used for join fetching:
//!
//! ```text
//! select [distinct] u from User [as] u
//!   ( [left [outer] | inner] join [fetch] u.assoc [[as] alias] )*
//!   [ where u.id = (<integer> | :param) ( and d.id = ... )* ]
//! ```
//!
//! Keywords are case-insensitive; entity, alias and association names are not.

use std::collections::HashSet;

use crate::error::{ModelError, ModelResult};
use crate::model::EntityId;

use super::types::JoinType;

const KEYWORDS: &[&str] = &[
    "select", "distinct", "from", "as", "left", "outer", "inner", "join", "fetch", "where", "and",
];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(EntityId),
    Dot,
    Colon,
    Eq,
}

impl Token {
    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(word) if word.eq_ignore_ascii_case(keyword))
    }

    fn describe(&self) -> String {
        match self {
            Token::Ident(word) => format!("'{}'", word),
            Token::Number(n) => format!("'{}'", n),
            Token::Dot => "'.'".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Eq => "'='".to_string(),
        }
    }
}

/// Right-hand side of an id comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionValue {
    Literal(EntityId),
    Parameter(String),
}

/// `<alias>.id = <value>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdCondition {
    pub alias: String,
    pub value: ConditionValue,
}

/// One `join` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    pub join_type: JoinType,
    pub fetch: bool,
    pub parent_alias: String,
    pub association: String,
    pub alias: Option<String>,
}

/// Parsed form of a query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub distinct: bool,
    pub entity: String,
    pub root_alias: String,
    pub joins: Vec<JoinSpec>,
    pub conditions: Vec<IdCondition>,
}

impl ParsedQuery {
    /// Parse query text
    pub fn parse(text: &str) -> ModelResult<Self> {
        Parser::new(tokenize(text)?).parse_query()
    }

    /// Names of every `:param` placeholder, in order of appearance
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for condition in &self.conditions {
            if let ConditionValue::Parameter(name) = &condition.value {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }
}

fn tokenize(text: &str) -> ModelResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '.' {
            chars.next();
            tokens.push(Token::Dot);
        } else if c == ':' {
            chars.next();
            tokens.push(Token::Colon);
        } else if c == '=' {
            chars.next();
            tokens.push(Token::Eq);
        } else if c.is_ascii_digit() || c == '-' {
            let mut literal = String::new();
            literal.push(c);
            chars.next();
            while let Some(&d) = chars.peek() {
                if !d.is_ascii_digit() {
                    break;
                }
                literal.push(d);
                chars.next();
            }
            let value = literal
                .parse::<EntityId>()
                .map_err(|_| ModelError::Query(format!("Invalid integer literal '{}'", literal)))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let mut word = String::new();
            while let Some(&d) = chars.peek() {
                if !(d.is_alphanumeric() || d == '_') {
                    break;
                }
                word.push(d);
                chars.next();
            }
            tokens.push(Token::Ident(word));
        } else {
            return Err(ModelError::Query(format!("Unexpected character '{}' in query", c)));
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    aliases: HashSet<String>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            aliases: HashSet::new(),
        }
    }

    fn parse_query(mut self) -> ModelResult<ParsedQuery> {
        self.expect_keyword("select")?;
        let distinct = self.eat_keyword("distinct");
        let selected = self.expect_name("select alias")?;
        self.expect_keyword("from")?;
        let entity = self.expect_name("entity name")?;
        self.eat_keyword("as");
        let root_alias = self.expect_name("root alias")?;
        if selected != root_alias {
            return Err(ModelError::Query(format!(
                "Selected alias '{}' does not match root alias '{}'",
                selected, root_alias
            )));
        }
        self.define_alias(&root_alias)?;

        let mut joins = Vec::new();
        while let Some(join_type) = self.parse_join_type()? {
            joins.push(self.parse_join(join_type)?);
        }

        let mut conditions = Vec::new();
        if self.eat_keyword("where") {
            conditions.push(self.parse_condition()?);
            while self.eat_keyword("and") {
                conditions.push(self.parse_condition()?);
            }
        }

        if let Some(token) = self.peek() {
            return Err(ModelError::Query(format!(
                "Unexpected {} after end of query",
                token.describe()
            )));
        }

        Ok(ParsedQuery {
            distinct,
            entity,
            root_alias,
            joins,
            conditions,
        })
    }

    fn parse_join_type(&mut self) -> ModelResult<Option<JoinType>> {
        if self.eat_keyword("left") {
            self.eat_keyword("outer");
            self.expect_keyword("join")?;
            Ok(Some(JoinType::Left))
        } else if self.eat_keyword("inner") {
            self.expect_keyword("join")?;
            Ok(Some(JoinType::Inner))
        } else if self.eat_keyword("join") {
            Ok(Some(JoinType::Inner))
        } else {
            Ok(None)
        }
    }

    fn parse_join(&mut self, join_type: JoinType) -> ModelResult<JoinSpec> {
        let fetch = self.eat_keyword("fetch");
        let parent_alias = self.expect_name("join owner alias")?;
        if !self.aliases.contains(&parent_alias) {
            return Err(ModelError::Query(format!("Unknown alias '{}'", parent_alias)));
        }
        self.expect(Token::Dot)?;
        let association = self.expect_name("association name")?;

        let alias = if self.eat_keyword("as") {
            Some(self.expect_name("join alias")?)
        } else if matches!(self.peek(), Some(Token::Ident(word)) if !is_keyword(word)) {
            Some(self.expect_name("join alias")?)
        } else {
            None
        };
        if let Some(alias) = &alias {
            self.define_alias(alias)?;
        }

        Ok(JoinSpec {
            join_type,
            fetch,
            parent_alias,
            association,
            alias,
        })
    }

    fn parse_condition(&mut self) -> ModelResult<IdCondition> {
        let alias = self.expect_name("alias")?;
        if !self.aliases.contains(&alias) {
            return Err(ModelError::Query(format!("Unknown alias '{}'", alias)));
        }
        self.expect(Token::Dot)?;
        let attribute = self.expect_name("attribute")?;
        if attribute != "id" {
            return Err(ModelError::Query(format!(
                "Only id comparisons are supported, found '{}.{}'",
                alias, attribute
            )));
        }
        self.expect(Token::Eq)?;

        let value = match self.next() {
            Some(Token::Number(n)) => ConditionValue::Literal(n),
            Some(Token::Colon) => ConditionValue::Parameter(self.expect_name("parameter name")?),
            Some(token) => {
                return Err(ModelError::Query(format!(
                    "Expected integer or parameter, found {}",
                    token.describe()
                )))
            }
            None => return Err(ModelError::Query("Unexpected end of query".to_string())),
        };

        Ok(IdCondition { alias, value })
    }

    fn define_alias(&mut self, alias: &str) -> ModelResult<()> {
        if !self.aliases.insert(alias.to_string()) {
            return Err(ModelError::Query(format!("Alias '{}' is defined twice", alias)));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().map_or(false, |t| t.is_keyword(keyword)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> ModelResult<()> {
        if self.eat_keyword(keyword) {
            return Ok(());
        }
        Err(match self.peek() {
            Some(token) => ModelError::Query(format!(
                "Expected '{}', found {}",
                keyword,
                token.describe()
            )),
            None => ModelError::Query(format!("Expected '{}', found end of query", keyword)),
        })
    }

    fn expect(&mut self, expected: Token) -> ModelResult<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(ModelError::Query(format!(
                "Expected {}, found {}",
                expected.describe(),
                token.describe()
            ))),
            None => Err(ModelError::Query(format!(
                "Expected {}, found end of query",
                expected.describe()
            ))),
        }
    }

    fn expect_name(&mut self, what: &str) -> ModelResult<String> {
        match self.next() {
            Some(Token::Ident(word)) if !is_keyword(&word) => Ok(word),
            Some(token) => Err(ModelError::Query(format!(
                "Expected {}, found {}",
                what,
                token.describe()
            ))),
            None => Err(ModelError::Query(format!("Expected {}, found end of query", what))),
        }
    }
}

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k))
}
