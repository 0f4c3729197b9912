use super::token_stream::TokenStream;
use crate::diagnostics::DiagnosticSink;
use const_format::concatcp;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

#[derive(Clone, Debug, PartialEq)]
pub enum TokenValue {
    None,
    Str(String),
    Number(f64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub(crate) typ: TokenType,
    pub(crate) line: usize,
    pub(crate) value: TokenValue,
}

impl Token {
    pub(crate) fn new(typ: TokenType, line: usize) -> Self {
        Self {
            typ,
            line,
            value: TokenValue::None,
        }
    }

    pub(crate) fn with_value(typ: TokenType, line: usize, value: TokenValue) -> Self {
        Self { typ, line, value }
    }

    pub fn typ(&self) -> TokenType {
        self.typ
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn value(&self) -> &TokenValue {
        &self.value
    }

    /// Identifier name or string contents; empty for every other kind.
    pub(crate) fn text(&self) -> &str {
        match &self.value {
            TokenValue::Str(s) => s.as_str(),
            _ => "",
        }
    }
}

/// Source-like rendering, used by the AST dump and parser diagnostics.
impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.typ, &self.value) {
            (TokenType::NAME, TokenValue::Str(name)) => write!(f, "{name}"),
            (TokenType::STRING, TokenValue::Str(s)) => write!(f, "\"{}\"", escape(s)),
            (TokenType::NUMBER, TokenValue::Number(n)) => write!(f, "{}", number_literal(*n)),
            (typ, _) => write!(f, "{}", typ.source_name()),
        }
    }
}

fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    escaped
}

// Six decimals unless that loses precision.
fn number_literal(n: f64) -> String {
    let padded = format!("{n:.6}");
    if padded.parse::<f64>() == Ok(n) {
        padded
    } else {
        format!("{n}")
    }
}

#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TokenType {
    LPAR,
    RPAR,
    LBRACE,
    RBRACE,
    COMMA,
    DOT,
    MINUS,
    PLUS,
    SEMI,
    SLASH,
    STAR,
    EXCLAMATION,
    NOTEQUAL,
    EQUAL,
    EQEQUAL,
    GREATER,
    GREATEREQUAL,
    LESS,
    LESSEQUAL,
    NAME,
    STRING,
    NUMBER,
    AND,
    CLASS,
    ELSE,
    FALSE,
    FUN,
    FOR,
    IF,
    NIL,
    OR,
    PRINT,
    RETURN,
    SUPER,
    THIS,
    TRUE,
    VAR,
    WHILE,
    ENDMARKER,
}

impl TokenType {
    pub fn source_name(self) -> &'static str {
        match self {
            Self::LPAR => "(",
            Self::RPAR => ")",
            Self::LBRACE => "{",
            Self::RBRACE => "}",
            Self::COMMA => ",",
            Self::DOT => ".",
            Self::MINUS => "-",
            Self::PLUS => "+",
            Self::SEMI => ";",
            Self::SLASH => "/",
            Self::STAR => "*",
            Self::EXCLAMATION => "!",
            Self::NOTEQUAL => "!=",
            Self::EQUAL => "=",
            Self::EQEQUAL => "==",
            Self::GREATER => ">",
            Self::GREATEREQUAL => ">=",
            Self::LESS => "<",
            Self::LESSEQUAL => "<=",
            Self::NAME => "NAME",
            Self::STRING => "STRING",
            Self::NUMBER => "NUMBER",
            Self::AND => "and",
            Self::CLASS => "class",
            Self::ELSE => "else",
            Self::FALSE => "false",
            Self::FUN => "fun",
            Self::FOR => "for",
            Self::IF => "if",
            Self::NIL => "nil",
            Self::OR => "or",
            Self::PRINT => "print",
            Self::RETURN => "return",
            Self::SUPER => "super",
            Self::THIS => "this",
            Self::TRUE => "true",
            Self::VAR => "var",
            Self::WHILE => "while",
            Self::ENDMARKER => "end of file",
        }
    }
}

const NOTEQUAL: (&str, TokenType) = ("!=", TokenType::NOTEQUAL);
const EQEQUAL: (&str, TokenType) = ("==", TokenType::EQEQUAL);
const LESSEQUAL: (&str, TokenType) = ("<=", TokenType::LESSEQUAL);
const GREATEREQUAL: (&str, TokenType) = (">=", TokenType::GREATEREQUAL);
const LPAR: (&str, TokenType) = ("(", TokenType::LPAR);
const RPAR: (&str, TokenType) = (")", TokenType::RPAR);
const LBRACE: (&str, TokenType) = ("{", TokenType::LBRACE);
const RBRACE: (&str, TokenType) = ("}", TokenType::RBRACE);
const COMMA: (&str, TokenType) = (",", TokenType::COMMA);
const DOT: (&str, TokenType) = (".", TokenType::DOT);
const MINUS: (&str, TokenType) = ("-", TokenType::MINUS);
const PLUS: (&str, TokenType) = ("+", TokenType::PLUS);
const SEMI: (&str, TokenType) = (";", TokenType::SEMI);
const SLASH: (&str, TokenType) = ("/", TokenType::SLASH);
const STAR: (&str, TokenType) = ("*", TokenType::STAR);
const EXCLAMATION: (&str, TokenType) = ("!", TokenType::EXCLAMATION);
const EQUAL: (&str, TokenType) = ("=", TokenType::EQUAL);
const GREATER: (&str, TokenType) = (">", TokenType::GREATER);
const LESS: (&str, TokenType) = ("<", TokenType::LESS);

// Two-character operators first: maximal munch.
const SIMPLE_TOKENS: [(&str, TokenType); 19] = [
    NOTEQUAL,
    EQEQUAL,
    LESSEQUAL,
    GREATEREQUAL,
    LPAR,
    RPAR,
    LBRACE,
    RBRACE,
    COMMA,
    DOT,
    MINUS,
    PLUS,
    SEMI,
    SLASH,
    STAR,
    EXCLAMATION,
    EQUAL,
    GREATER,
    LESS,
];

const S_WHITESPACE: &str = r"^[ \f\t\r\n]+";
const S_COMMENT: &str = r"^//[^\n]*";
const S_DIGITS: &str = r"[0-9]+";
const S_NUMBER: &str = concatcp!("^", S_DIGITS, r"(?:\.", S_DIGITS, ")?");
const S_NAME: &str = r"^[A-Za-z_][A-Za-z0-9_]*";

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(S_WHITESPACE).expect("Error compiling regex."));
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(S_COMMENT).expect("Error compiling regex."));
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(S_NUMBER).expect("Error compiling regex."));
static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(S_NAME).expect("Error compiling regex."));

static KEYWORDS: Lazy<FxHashMap<&'static str, TokenType>> = Lazy::new(|| {
    [
        TokenType::AND,
        TokenType::CLASS,
        TokenType::ELSE,
        TokenType::FALSE,
        TokenType::FOR,
        TokenType::FUN,
        TokenType::IF,
        TokenType::NIL,
        TokenType::OR,
        TokenType::PRINT,
        TokenType::RETURN,
        TokenType::SUPER,
        TokenType::THIS,
        TokenType::TRUE,
        TokenType::VAR,
        TokenType::WHILE,
    ]
    .into_iter()
    .map(|typ| (typ.source_name(), typ))
    .collect()
});

/// Scans source text into a [`TokenStream`].
///
/// A tokenizer can be fed several batches (one per REPL line); the line
/// counter and the bracket balance carry over between them.
pub struct Tokenizer<'d> {
    diag: &'d dyn DiagnosticSink,
    start: usize,
    line: usize,
    paren_lvl: isize,
    errors: usize,
}

impl<'d> Tokenizer<'d> {
    pub fn new(diag: &'d dyn DiagnosticSink) -> Self {
        Self {
            diag,
            start: 0,
            line: 1,
            paren_lvl: 0,
            errors: 0,
        }
    }

    /// Net count of `(`/`{` minus `)`/`}` seen so far.
    pub fn bracket_balance(&self) -> isize {
        self.paren_lvl
    }

    pub fn reset_bracket_balance(&mut self) {
        self.paren_lvl = 0;
    }

    /// Lexes one batch. Returns the number of lexical errors on failure, every
    /// one of which has already been reported.
    pub fn tokenize(&mut self, source: &str) -> Result<TokenStream, usize> {
        let mut stream = TokenStream::new();
        self.start = 0;
        self.errors = 0;

        while self.start < source.len() {
            let rest = &source[self.start..];

            if let Some(m) = WHITESPACE.find(rest) {
                self.line += m.as_str().matches('\n').count();
                self.start += m.end();
                continue;
            }
            if let Some(m) = COMMENT.find(rest) {
                self.start += m.end();
                continue;
            }
            if let Some(m) = NUMBER.find(rest) {
                self.start += m.end();
                match m.as_str().parse::<f64>() {
                    Ok(n) => stream.push(Token::with_value(
                        TokenType::NUMBER,
                        self.line,
                        TokenValue::Number(n),
                    )),
                    Err(_) => self.report(&format!("at '{}'", m.as_str()), "Invalid number."),
                }
                continue;
            }
            if let Some(m) = NAME.find(rest) {
                self.start += m.end();
                let token = match KEYWORDS.get(m.as_str()) {
                    Some(&typ) => Token::new(typ, self.line),
                    None => Token::with_value(
                        TokenType::NAME,
                        self.line,
                        TokenValue::Str(m.as_str().to_string()),
                    ),
                };
                stream.push(token);
                continue;
            }
            if rest.starts_with('"') {
                if let Some(token) = self.string(rest) {
                    stream.push(token);
                }
                continue;
            }
            if let Some(token) = self.simple_token(rest) {
                stream.push(token);
                continue;
            }

            let c = rest.chars().next().unwrap_or_default();
            self.report(&format!("at '{c}'"), "Unexpected character.");
            self.start += c.len_utf8().max(1);
        }

        stream.push(Token::new(TokenType::ENDMARKER, self.line));
        tracing::trace!(tokens = stream.len(), errors = self.errors, "tokenized batch");
        if self.errors > 0 {
            Err(self.errors)
        } else {
            Ok(stream)
        }
    }

    fn simple_token(&mut self, rest: &str) -> Option<Token> {
        for (lexeme, tok_type) in SIMPLE_TOKENS {
            if rest.starts_with(lexeme) {
                self.start += lexeme.len();
                match tok_type {
                    TokenType::LPAR | TokenType::LBRACE => self.paren_lvl += 1,
                    TokenType::RPAR | TokenType::RBRACE => self.paren_lvl -= 1,
                    _ => {}
                }
                return Some(Token::new(tok_type, self.line));
            }
        }
        None
    }

    // `rest` starts at the opening quote.
    fn string(&mut self, rest: &str) -> Option<Token> {
        let line = self.line;
        let mut value = String::new();
        let mut valid = true;
        let mut chars = rest.char_indices().skip(1);

        loop {
            match chars.next() {
                None => break,
                Some((i, '"')) => {
                    self.start += i + 1;
                    if !valid {
                        return None;
                    }
                    return Some(Token::with_value(
                        TokenType::STRING,
                        line,
                        TokenValue::Str(value),
                    ));
                }
                Some((_, '\\')) => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, '\\')) => value.push('\\'),
                    Some((_, '"')) => value.push('"'),
                    Some((_, other)) => {
                        if other == '\n' {
                            self.line += 1;
                        }
                        self.report(&format!("at '\\{other}'"), "Unknown escape sequence.");
                        valid = false;
                    }
                    None => break,
                },
                Some((_, c)) => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    value.push(c);
                }
            }
        }

        self.start += rest.len();
        self.report("", "Unterminated string.");
        None
    }

    fn report(&mut self, location: &str, message: &str) {
        self.errors += 1;
        self.diag.report(self.line, location, message);
    }
}

/// Lexes a complete source text in one go.
pub fn tokenize_string(source: &str, diag: &dyn DiagnosticSink) -> Result<TokenStream, usize> {
    Tokenizer::new(diag).tokenize(source)
}
