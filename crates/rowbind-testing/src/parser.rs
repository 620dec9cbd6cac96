//! Tokenizer and parser for the SQL subset understood by the in-memory
//! engine.
//!
//! Supported statements:
//!
//! - `CREATE [TEMPORARY] TABLE t (col TYPE [NOT NULL] [PRIMARY KEY], ..., [PRIMARY KEY (cols)])`
//! - `DROP TABLE [IF EXISTS] t`
//! - `INSERT INTO t [(cols)] VALUES (operands)`
//! - `SELECT cols | * FROM t [alias], ... [WHERE cond AND ...] [ORDER BY col [ASC|DESC], ...]`
//! - `UPDATE t SET col = operand, ... [WHERE cond AND ...]`
//! - `DELETE FROM t [WHERE cond AND ...]`
//!
//! A condition compares two operands with `= <> != < <= > >=`; an operand is
//! a column (optionally qualified), a `?` placeholder or a literal.
//! Identifiers are case-insensitive and normalised to lowercase.

use std::cmp::Ordering;
use std::fmt;

use rowbind_driver::{Diagnostic, SqlState};
use rowbind_types::SqlValue;
use thiserror::Error;

/// Errors raised while tokenizing or parsing a statement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// A character that starts no token.
    #[error("unexpected character {found:?} at position {position}")]
    UnexpectedChar {
        /// The character.
        found: char,
        /// Character offset in the statement.
        position: usize,
    },

    /// A string literal without its closing quote.
    #[error("unterminated string literal starting at position {position}")]
    UnterminatedString {
        /// Character offset of the opening quote.
        position: usize,
    },

    /// A numeric literal that does not parse.
    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    /// A token other than the one the grammar requires.
    #[error("expected {expected}, found {found}")]
    Expected {
        /// What the grammar requires.
        expected: &'static str,
        /// The token found.
        found: String,
    },

    /// The statement ended early.
    #[error("unexpected end of statement, expected {0}")]
    UnexpectedEnd(&'static str),
}

impl From<ParseError> for Diagnostic {
    fn from(error: ParseError) -> Self {
        Diagnostic::new(SqlState::SYNTAX_ERROR, 1, error.to_string())
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier or keyword, as written.
    Word(String),
    /// Integer literal.
    Integer(i64),
    /// Floating point literal.
    Float(f64),
    /// Quoted string literal, quotes removed.
    Text(String),
    /// `?`
    Placeholder,
    /// Comparison operator.
    Compare(CompareOp),
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `*`
    Star,
    /// `-`
    Minus,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `;`
    Semicolon,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(word) => write!(f, "{word:?}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(text) => write!(f, "'{text}'"),
            Self::Placeholder => f.write_str("?"),
            Self::Compare(op) => write!(f, "{op}"),
            Self::Comma => f.write_str(","),
            Self::Dot => f.write_str("."),
            Self::Star => f.write_str("*"),
            Self::Minus => f.write_str("-"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::Semicolon => f.write_str(";"),
        }
    }
}

/// Converts statement text into tokens.
struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.skip_whitespace_and_comments() {
            tokens.push(self.next_token(ch)?);
        }
        Ok(tokens)
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    /// Skip blanks and `--` comments; return the next significant character.
    fn skip_whitespace_and_comments(&mut self) -> Option<char> {
        loop {
            let ch = self.current()?;
            if ch.is_whitespace() {
                self.position += 1;
            } else if ch == '-' && self.peek() == Some('-') {
                while self.current().is_some_and(|ch| ch != '\n') {
                    self.position += 1;
                }
            } else {
                return Some(ch);
            }
        }
    }

    fn next_token(&mut self, ch: char) -> Result<Token, ParseError> {
        let single = match ch {
            ',' => Some(Token::Comma),
            '.' if !self.peek().is_some_and(|next| next.is_ascii_digit()) => Some(Token::Dot),
            '*' => Some(Token::Star),
            '-' => Some(Token::Minus),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ';' => Some(Token::Semicolon),
            '?' => Some(Token::Placeholder),
            '=' => Some(Token::Compare(CompareOp::Eq)),
            _ => None,
        };
        if let Some(token) = single {
            self.position += 1;
            return Ok(token);
        }

        match ch {
            '<' | '>' | '!' => self.operator(ch),
            '\'' => self.string(),
            '"' | '`' | '[' => self.quoted_identifier(ch),
            c if c.is_ascii_digit() || c == '.' => self.number(),
            c if c.is_alphabetic() || c == '_' => Ok(self.word()),
            found => Err(ParseError::UnexpectedChar {
                found,
                position: self.position,
            }),
        }
    }

    fn operator(&mut self, ch: char) -> Result<Token, ParseError> {
        let start = self.position;
        self.position += 1;
        let next = self.current();
        let (op, width) = match (ch, next) {
            ('<', Some('=')) => (CompareOp::Le, 1),
            ('<', Some('>')) | ('!', Some('=')) => (CompareOp::Ne, 1),
            ('>', Some('=')) => (CompareOp::Ge, 1),
            ('<', _) => (CompareOp::Lt, 0),
            ('>', _) => (CompareOp::Gt, 0),
            (found, _) => {
                return Err(ParseError::UnexpectedChar {
                    found,
                    position: start,
                });
            }
        };
        self.position += width;
        Ok(Token::Compare(op))
    }

    fn string(&mut self) -> Result<Token, ParseError> {
        let start = self.position;
        self.position += 1;
        let mut text = String::new();
        loop {
            match self.current() {
                None => return Err(ParseError::UnterminatedString { position: start }),
                // '' is an escaped quote
                Some('\'') if self.peek() == Some('\'') => {
                    text.push('\'');
                    self.position += 2;
                }
                Some('\'') => {
                    self.position += 1;
                    return Ok(Token::Text(text));
                }
                Some(ch) => {
                    text.push(ch);
                    self.position += 1;
                }
            }
        }
    }

    fn quoted_identifier(&mut self, open: char) -> Result<Token, ParseError> {
        let close = if open == '[' { ']' } else { open };
        let start = self.position;
        self.position += 1;
        let mut name = String::new();
        loop {
            match self.current() {
                None => return Err(ParseError::UnterminatedString { position: start }),
                Some(ch) if ch == close => {
                    self.position += 1;
                    return Ok(Token::Word(name));
                }
                Some(ch) => {
                    name.push(ch);
                    self.position += 1;
                }
            }
        }
    }

    fn number(&mut self) -> Result<Token, ParseError> {
        let start = self.position;
        let mut is_float = false;
        while let Some(ch) = self.current() {
            if ch == '.' || ch == 'e' || ch == 'E' {
                is_float = true;
            } else if !ch.is_ascii_digit() {
                break;
            }
            self.position += 1;
        }
        let text: String = self.input[start..self.position].iter().collect();
        if is_float {
            text.parse()
                .map(Token::Float)
                .map_err(|_| ParseError::InvalidNumber(text))
        } else {
            text.parse()
                .map(Token::Integer)
                .map_err(|_| ParseError::InvalidNumber(text))
        }
    }

    fn word(&mut self) -> Token {
        let start = self.position;
        while self
            .current()
            .is_some_and(|ch| ch.is_alphanumeric() || ch == '_')
        {
            self.position += 1;
        }
        Token::Word(self.input[start..self.position].iter().collect())
    }
}

// ============================================================================
// Statements
// ============================================================================

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>` or `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// Whether `ordering` (left compared with right) satisfies the operator.
    #[must_use]
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        })
    }
}

/// Storage class of a column, derived from its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Signed integers of any width.
    Integer,
    /// Unsigned integers of any width.
    Unsigned,
    /// Floating point.
    Real,
    /// Boolean.
    Bool,
    /// Date and time.
    Timestamp,
    /// Character data, optionally bounded in bytes.
    Text {
        /// Declared maximum length.
        length: Option<usize>,
    },
    /// Exact decimal integers.
    Numeric,
}

/// A column declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Storage class.
    pub data_type: DataType,
    /// Whether NULL is rejected.
    pub not_null: bool,
}

/// `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    /// Table name.
    pub name: String,
    /// Whether the table is private to the session.
    pub temporary: bool,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Primary key column names.
    pub primary_key: Vec<String>,
}

/// A possibly qualified column reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    /// Table name or alias.
    pub qualifier: Option<String>,
    /// Column name.
    pub name: String,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{qualifier}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A value in a condition, assignment or insert list.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// The `n`th placeholder of the statement, from 0.
    Parameter(usize),
    /// A column of a row in scope.
    Column(ColumnRef),
    /// A constant.
    Literal(SqlValue),
}

/// `left op right`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Left operand.
    pub left: Operand,
    /// Operator.
    pub op: CompareOp,
    /// Right operand.
    pub right: Operand,
}

/// A table in a `FROM` list.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    /// Table name.
    pub name: String,
    /// Alias, if given.
    pub alias: Option<String>,
}

/// One `ORDER BY` key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    /// Sort column.
    pub column: ColumnRef,
    /// Whether the order is descending.
    pub descending: bool,
}

/// `SELECT`.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// Projected columns; `None` for `*`.
    pub columns: Option<Vec<ColumnRef>>,
    /// Tables joined as a cross product.
    pub from: Vec<TableRef>,
    /// Conjunction of conditions.
    pub filter: Vec<Comparison>,
    /// Sort keys.
    pub order_by: Vec<OrderKey>,
}

/// `INSERT`.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    /// Target table.
    pub table: String,
    /// Target columns; empty means all, in declaration order.
    pub columns: Vec<String>,
    /// One operand per target column.
    pub values: Vec<Operand>,
}

/// `UPDATE`.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Target table.
    pub table: String,
    /// `column = operand` pairs.
    pub assignments: Vec<(String, Operand)>,
    /// Conjunction of conditions.
    pub filter: Vec<Comparison>,
}

/// `DELETE`.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    /// Target table.
    pub table: String,
    /// Conjunction of conditions.
    pub filter: Vec<Comparison>,
}

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `CREATE TABLE`.
    CreateTable(CreateTable),
    /// `DROP TABLE`.
    DropTable {
        /// Table name.
        name: String,
        /// Whether a missing table is ignored.
        if_exists: bool,
    },
    /// `INSERT`.
    Insert(Insert),
    /// `SELECT`.
    Select(Select),
    /// `UPDATE`.
    Update(Update),
    /// `DELETE`.
    Delete(Delete),
}

impl Statement {
    /// The table a data or schema change writes to; `None` for queries.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::CreateTable(create) => Some(&create.name),
            Self::DropTable { name, .. } => Some(name),
            Self::Insert(insert) => Some(&insert.table),
            Self::Update(update) => Some(&update.table),
            Self::Delete(delete) => Some(&delete.table),
            Self::Select(_) => None,
        }
    }
}

/// A statement and the number of placeholders it contains.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    /// The statement.
    pub statement: Statement,
    /// Number of `?` placeholders.
    pub parameters: usize,
}

/// Parse one statement. A trailing `;` is allowed.
pub fn parse(sql: &str) -> Result<Parsed, ParseError> {
    let tokens = Lexer::new(sql).tokenize()?;
    let mut parser = Parser {
        tokens,
        position: 0,
        parameters: 0,
    };
    let statement = parser.statement()?;
    parser.accept(&Token::Semicolon);
    if let Some(token) = parser.peek() {
        return Err(ParseError::Expected {
            expected: "end of statement",
            found: token.to_string(),
        });
    }
    Ok(Parsed {
        statement,
        parameters: parser.parameters,
    })
}

/// Words that end a table alias or a column list.
const RESERVED: &[&str] = &[
    "AND", "AS", "ASC", "BY", "CREATE", "DELETE", "DESC", "DROP", "FROM", "INSERT", "INTO",
    "KEY", "NOT", "NULL", "ORDER", "PRIMARY", "SELECT", "SET", "TABLE", "UPDATE", "VALUES",
    "WHERE",
];

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    parameters: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self, expected: &'static str) -> Result<Token, ParseError> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or(ParseError::UnexpectedEnd(expected))?;
        self.position += 1;
        Ok(token)
    }

    fn accept(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, expected: &'static str) -> Result<(), ParseError> {
        match self.next(expected)? {
            found if found == *token => Ok(()),
            found => Err(ParseError::Expected {
                expected,
                found: found.to_string(),
            }),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn accept_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &'static str) -> Result<(), ParseError> {
        if self.accept_keyword(keyword) {
            return Ok(());
        }
        match self.peek() {
            Some(token) => Err(ParseError::Expected {
                expected: keyword,
                found: token.to_string(),
            }),
            None => Err(ParseError::UnexpectedEnd(keyword)),
        }
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        match self.next("identifier")? {
            Token::Word(word) if !is_reserved(&word) => Ok(word.to_ascii_lowercase()),
            found => Err(ParseError::Expected {
                expected: "identifier",
                found: found.to_string(),
            }),
        }
    }

    fn identifier_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(&Token::LParen, "(")?;
        let mut names = vec![self.identifier()?];
        while self.accept(&Token::Comma) {
            names.push(self.identifier()?);
        }
        self.expect(&Token::RParen, ")")?;
        Ok(names)
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        if self.accept_keyword("CREATE") {
            self.create_table().map(Statement::CreateTable)
        } else if self.accept_keyword("DROP") {
            self.drop_table()
        } else if self.accept_keyword("INSERT") {
            self.insert().map(Statement::Insert)
        } else if self.accept_keyword("SELECT") {
            self.select().map(Statement::Select)
        } else if self.accept_keyword("UPDATE") {
            self.update().map(Statement::Update)
        } else if self.accept_keyword("DELETE") {
            self.delete().map(Statement::Delete)
        } else {
            match self.peek() {
                Some(token) => Err(ParseError::Expected {
                    expected: "CREATE, DROP, INSERT, SELECT, UPDATE or DELETE",
                    found: token.to_string(),
                }),
                None => Err(ParseError::UnexpectedEnd("statement")),
            }
        }
    }

    fn create_table(&mut self) -> Result<CreateTable, ParseError> {
        let temporary = self.accept_keyword("TEMPORARY") || self.accept_keyword("TEMP");
        self.expect_keyword("TABLE")?;
        let name = self.identifier()?;
        self.expect(&Token::LParen, "(")?;

        let mut columns = Vec::new();
        let mut primary_key = Vec::new();
        loop {
            if self.accept_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                primary_key = self.identifier_list()?;
            } else {
                let (column, inline_key) = self.column_def()?;
                if inline_key {
                    primary_key = vec![column.name.clone()];
                }
                columns.push(column);
            }
            if !self.accept(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen, ")")?;

        Ok(CreateTable {
            name,
            temporary,
            columns,
            primary_key,
        })
    }

    /// A column declaration and whether it carries an inline `PRIMARY KEY`.
    fn column_def(&mut self) -> Result<(ColumnDef, bool), ParseError> {
        let name = self.identifier()?;
        let type_name = match self.next("column type")? {
            Token::Word(word) => word.to_ascii_uppercase(),
            found => {
                return Err(ParseError::Expected {
                    expected: "column type",
                    found: found.to_string(),
                });
            }
        };

        let mut length = None;
        let mut unsigned = false;
        let mut not_null = false;
        let mut primary_key = false;
        loop {
            if self.accept(&Token::LParen) {
                length = Some(self.length()?);
                // scale of DECIMAL(p, s)
                if self.accept(&Token::Comma) {
                    self.length()?;
                }
                self.expect(&Token::RParen, ")")?;
            } else if self.accept_keyword("UNSIGNED") {
                unsigned = true;
            } else if self.accept_keyword("PRECISION") || self.accept_keyword("VARYING") {
                // second word of DOUBLE PRECISION, CHARACTER VARYING
            } else if self.accept_keyword("NOT") {
                self.expect_keyword("NULL")?;
                not_null = true;
            } else if self.accept_keyword("NULL") {
                not_null = false;
            } else if self.accept_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                primary_key = true;
            } else {
                break;
            }
        }

        let data_type = match type_name.as_str() {
            "TINYINT" | "SMALLINT" | "INT" | "INTEGER" | "BIGINT" if unsigned => DataType::Unsigned,
            "TINYINT" | "SMALLINT" | "INT" | "INTEGER" | "BIGINT" => DataType::Integer,
            "REAL" | "FLOAT" | "DOUBLE" => DataType::Real,
            "BOOLEAN" | "BOOL" | "BIT" => DataType::Bool,
            "TIMESTAMP" | "DATETIME" | "DATETIME2" => DataType::Timestamp,
            "VARCHAR" | "CHAR" | "CHARACTER" | "NVARCHAR" | "TEXT" => DataType::Text { length },
            "NUMERIC" | "DECIMAL" => DataType::Numeric,
            _ => {
                return Err(ParseError::Expected {
                    expected: "column type",
                    found: type_name,
                });
            }
        };

        Ok((
            ColumnDef {
                name,
                data_type,
                not_null,
            },
            primary_key,
        ))
    }

    fn length(&mut self) -> Result<usize, ParseError> {
        match self.next("length")? {
            Token::Integer(value) => {
                usize::try_from(value).map_err(|_| ParseError::InvalidNumber(value.to_string()))
            }
            found => Err(ParseError::Expected {
                expected: "length",
                found: found.to_string(),
            }),
        }
    }

    fn drop_table(&mut self) -> Result<Statement, ParseError> {
        self.expect_keyword("TABLE")?;
        let if_exists = if self.accept_keyword("IF") {
            self.expect_keyword("EXISTS")?;
            true
        } else {
            false
        };
        let name = self.identifier()?;
        Ok(Statement::DropTable { name, if_exists })
    }

    fn insert(&mut self) -> Result<Insert, ParseError> {
        self.expect_keyword("INTO")?;
        let table = self.identifier()?;
        let columns = if self.peek() == Some(&Token::LParen) {
            self.identifier_list()?
        } else {
            Vec::new()
        };
        self.expect_keyword("VALUES")?;
        self.expect(&Token::LParen, "(")?;
        let mut values = vec![self.operand()?];
        while self.accept(&Token::Comma) {
            values.push(self.operand()?);
        }
        self.expect(&Token::RParen, ")")?;
        Ok(Insert {
            table,
            columns,
            values,
        })
    }

    fn select(&mut self) -> Result<Select, ParseError> {
        let columns = if self.accept(&Token::Star) {
            None
        } else {
            let mut columns = vec![self.column_ref()?];
            while self.accept(&Token::Comma) {
                columns.push(self.column_ref()?);
            }
            Some(columns)
        };

        self.expect_keyword("FROM")?;
        let mut from = vec![self.table_ref()?];
        while self.accept(&Token::Comma) {
            from.push(self.table_ref()?);
        }

        let filter = self.filter()?;

        let mut order_by = Vec::new();
        if self.accept_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let column = self.column_ref()?;
                let descending = if self.accept_keyword("DESC") {
                    true
                } else {
                    self.accept_keyword("ASC");
                    false
                };
                order_by.push(OrderKey { column, descending });
                if !self.accept(&Token::Comma) {
                    break;
                }
            }
        }

        Ok(Select {
            columns,
            from,
            filter,
            order_by,
        })
    }

    fn update(&mut self) -> Result<Update, ParseError> {
        let table = self.identifier()?;
        self.expect_keyword("SET")?;
        let mut assignments = Vec::new();
        loop {
            let column = self.identifier()?;
            self.expect(&Token::Compare(CompareOp::Eq), "=")?;
            assignments.push((column, self.operand()?));
            if !self.accept(&Token::Comma) {
                break;
            }
        }
        let filter = self.filter()?;
        Ok(Update {
            table,
            assignments,
            filter,
        })
    }

    fn delete(&mut self) -> Result<Delete, ParseError> {
        self.expect_keyword("FROM")?;
        let table = self.identifier()?;
        let filter = self.filter()?;
        Ok(Delete { table, filter })
    }

    fn table_ref(&mut self) -> Result<TableRef, ParseError> {
        let name = self.identifier()?;
        let alias = if self.accept_keyword("AS") {
            Some(self.identifier()?)
        } else {
            match self.peek() {
                Some(Token::Word(word)) if !is_reserved(word) => Some(self.identifier()?),
                _ => None,
            }
        };
        Ok(TableRef { name, alias })
    }

    fn column_ref(&mut self) -> Result<ColumnRef, ParseError> {
        let first = self.identifier()?;
        if self.accept(&Token::Dot) {
            Ok(ColumnRef {
                qualifier: Some(first),
                name: self.identifier()?,
            })
        } else {
            Ok(ColumnRef {
                qualifier: None,
                name: first,
            })
        }
    }

    /// An optional `WHERE` clause.
    fn filter(&mut self) -> Result<Vec<Comparison>, ParseError> {
        let mut filter = Vec::new();
        if self.accept_keyword("WHERE") {
            loop {
                let left = self.operand()?;
                let op = match self.next("comparison operator")? {
                    Token::Compare(op) => op,
                    found => {
                        return Err(ParseError::Expected {
                            expected: "comparison operator",
                            found: found.to_string(),
                        });
                    }
                };
                let right = self.operand()?;
                filter.push(Comparison { left, op, right });
                if !self.accept_keyword("AND") {
                    break;
                }
            }
        }
        Ok(filter)
    }

    fn operand(&mut self) -> Result<Operand, ParseError> {
        match self.peek() {
            Some(Token::Placeholder) => {
                self.position += 1;
                let index = self.parameters;
                self.parameters += 1;
                Ok(Operand::Parameter(index))
            }
            Some(Token::Word(word)) if word.eq_ignore_ascii_case("NULL") => {
                self.position += 1;
                Ok(Operand::Literal(SqlValue::Null))
            }
            Some(Token::Word(word)) if word.eq_ignore_ascii_case("TRUE") => {
                self.position += 1;
                Ok(Operand::Literal(SqlValue::Bool(true)))
            }
            Some(Token::Word(word)) if word.eq_ignore_ascii_case("FALSE") => {
                self.position += 1;
                Ok(Operand::Literal(SqlValue::Bool(false)))
            }
            Some(Token::Word(_)) => self.column_ref().map(Operand::Column),
            Some(Token::Minus) => {
                self.position += 1;
                match self.next("number")? {
                    Token::Integer(value) => Ok(Operand::Literal(SqlValue::Int(-value))),
                    Token::Float(value) => Ok(Operand::Literal(SqlValue::Float(-value))),
                    found => Err(ParseError::Expected {
                        expected: "number",
                        found: found.to_string(),
                    }),
                }
            }
            _ => match self.next("operand")? {
                Token::Integer(value) => Ok(Operand::Literal(SqlValue::Int(value))),
                Token::Float(value) => Ok(Operand::Literal(SqlValue::Float(value))),
                Token::Text(text) => Ok(Operand::Literal(SqlValue::Text(text))),
                found => Err(ParseError::Expected {
                    expected: "operand",
                    found: found.to_string(),
                }),
            },
        }
    }
}

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|reserved| word.eq_ignore_ascii_case(reserved))
}
