//! SQL Tokens - the atomic units of SQL output.
//!
//! Every fragment the compiler emits is a stream of tokens. User-supplied
//! values can only enter as [`Token::Param`] placeholders; there is no raw-SQL
//! token. Schema-derived strings (property URIs, concept aliases used as
//! values) go through [`Token::LitString`], which escapes quotes.

/// SQL Token - every element the compiler emits.
///
/// Adding a new variant here will cause compile errors everywhere
/// it needs to be handled (exhaustive matching).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    On,
    Join,
    Inner,
    Left,
    OrderBy,
    Limit,
    Offset,
    In,
    ILike,
    Array,
    True,

    // === Punctuation ===
    Comma,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    /// JSON field as text: `->>`
    JsonText,
    /// JSON key exists: `?`
    HasKey,
    /// JSON contains all keys: `?&`
    HasAllKeys,
    /// Text search match: `@@`
    TsMatch,
    /// Type cast: `::`
    Cast,

    // === Whitespace ===
    Space,

    // === Dynamic Content ===
    /// Unquoted identifier. Callers only pass validated schema identifiers.
    Ident(String),
    /// Qualified identifier: schema.table or just table
    QualifiedIdent {
        schema: Option<String>,
        name: String,
    },
    /// Double-quoted identifier, used for output column aliases.
    QuotedIdent(String),
    /// Escaped string literal for schema-derived values.
    LitString(String),
    /// Integer literal (pagination only)
    LitInt(u64),
    /// Bound parameter placeholder: `:n`
    Param(usize),
    /// Function name, rendered as-is
    FunctionName(String),
    /// SQL type name after a cast
    TypeName(String),
}

impl Token {
    /// Serialize this token to PostgreSQL text.
    pub fn serialize(&self) -> String {
        match self {
            // Keywords
            Token::Select => "SELECT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::Or => "OR".into(),
            Token::Not => "not".into(),
            Token::As => "AS".into(),
            Token::On => "ON".into(),
            Token::Join => "JOIN".into(),
            Token::Inner => "INNER".into(),
            Token::Left => "LEFT".into(),
            Token::OrderBy => "ORDER BY".into(),
            Token::Limit => "LIMIT".into(),
            Token::Offset => "OFFSET".into(),
            Token::In => "IN".into(),
            Token::ILike => "ILIKE".into(),
            Token::Array => "array".into(),
            Token::True => "true".into(),

            // Punctuation
            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::LBracket => "[".into(),
            Token::RBracket => "]".into(),

            // Operators
            Token::Eq => "=".into(),
            Token::Ne => "!=".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Lte => "<=".into(),
            Token::Gte => ">=".into(),
            Token::JsonText => "->>".into(),
            Token::HasKey => "?".into(),
            Token::HasAllKeys => "?&".into(),
            Token::TsMatch => "@@".into(),
            Token::Cast => "::".into(),

            Token::Space => " ".into(),

            Token::Ident(name) => name.clone(),
            Token::QualifiedIdent { schema, name } => match schema {
                Some(s) => format!("{}.{}", s, name),
                None => name.clone(),
            },
            Token::QuotedIdent(name) => format!("\"{}\"", name.replace('"', "\"\"")),
            Token::LitString(s) => format!("'{}'", s.replace('\'', "''")),
            Token::LitInt(n) => n.to_string(),
            Token::Param(key) => format!(":{}", key),
            Token::FunctionName(name) => name.clone(),
            Token::TypeName(name) => name.clone(),
        }
    }
}

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Extend with multiple tokens.
    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    /// Wrap the stream in parentheses.
    pub fn parenthesized(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.lparen().append(self).rparen();
        ts
    }

    /// Join streams with a keyword surrounded by spaces (`a AND b AND c`).
    pub fn joined(parts: &[TokenStream], keyword: Token) -> TokenStream {
        let mut ts = TokenStream::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                ts.space().push(keyword.clone()).space();
            }
            ts.append(part);
        }
        ts
    }

    /// Join streams with single spaces.
    pub fn joined_by_space(parts: &[TokenStream]) -> TokenStream {
        let mut ts = TokenStream::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                ts.space();
            }
            ts.append(part);
        }
        ts
    }

    /// Comma-separated list of tokens (`:1, :2`).
    pub fn comma_list(items: impl IntoIterator<Item = Token>) -> TokenStream {
        let mut ts = TokenStream::new();
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(item);
        }
        ts
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Serialize all tokens to a SQL string.
    pub fn serialize(&self) -> String {
        self.tokens.iter().map(Token::serialize).collect()
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
    pub fn ident(&mut self, name: &str) -> &mut Self {
        self.push(Token::Ident(name.into()))
    }
    /// `table.column`
    pub fn column(&mut self, table: &str, column: &str) -> &mut Self {
        self.ident(table).push(Token::Dot).ident(column)
    }
}
