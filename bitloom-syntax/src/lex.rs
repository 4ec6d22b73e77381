//! Tokenizing source text.

use core::fmt;

use crate::error::{Result, SyntaxError};
use crate::reader::{self, Reader};

/// A numeric literal, decoded at lex time.
///
/// The digit strings are kept verbatim because the number of digits is
/// significant when a literal is used as data: a decimal literal
/// contributes one bit per character, a hex literal four bits per digit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// A decimal literal like `42` or `-1`.
    Bits(String),
    /// A hex literal like `0xF0`, stored without the `0x` prefix.
    Hex(String),
}

impl Literal {
    /// The numeric payload, for positions that expect a number: indices,
    /// slice bounds, shift amounts and `main`'s bit-width.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Bits(digits) => digits.parse().ok(),
            Self::Hex(digits) => i64::from_str_radix(digits, 16).ok(),
        }
    }

    /// Expand the literal into its bit sequence.
    ///
    /// Decimal literals yield one bit per character (`'0'` is false,
    /// anything else true); hex literals yield four bits per digit,
    /// MSB-first.
    pub fn bits(&self) -> Vec<bool> {
        match self {
            Self::Bits(digits) => digits.bytes().map(|b| b != b'0').collect(),
            Self::Hex(digits) => digits
                .bytes()
                .flat_map(|b| {
                    let nibble = (b as char).to_digit(16).unwrap_or(0);
                    (0..4).rev().map(move |i| ((nibble >> i) & 1) == 1)
                })
                .collect(),
        }
    }
}

/// The kind of a [`Token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// The `function` keyword.
    Function,
    /// The `return` keyword.
    Return,
    /// An identifier.
    Ident(String),
    /// A numeric literal.
    Literal(Literal),
    /// `=`
    Assign,
    /// `|`
    Pipe,
    /// `&`
    Amp,
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `&&`
    AndAnd,
    /// `||`
    PipePipe,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `<<<`
    Rotl,
    /// `>>>`
    Rotr,
    /// `::`
    Concat,
    /// `:`
    Colon,
    /// `;`
    Semicolon,
    /// `{`
    OpenBrace,
    /// `}`
    CloseBrace,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `[`
    OpenBracket,
    /// `]`
    CloseBracket,
    /// End of input.
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Function => "`function`",
            Self::Return => "`return`",
            Self::Ident(name) => return write!(f, "identifier `{name}`"),
            Self::Literal(Literal::Bits(digits)) => return write!(f, "literal `{digits}`"),
            Self::Literal(Literal::Hex(digits)) => return write!(f, "literal `0x{digits}`"),
            Self::Assign => "`=`",
            Self::Pipe => "`|`",
            Self::Amp => "`&`",
            Self::Caret => "`^`",
            Self::Tilde => "`~`",
            Self::Eq => "`==`",
            Self::Ne => "`!=`",
            Self::AndAnd => "`&&`",
            Self::PipePipe => "`||`",
            Self::Shl => "`<<`",
            Self::Shr => "`>>`",
            Self::Rotl => "`<<<`",
            Self::Rotr => "`>>>`",
            Self::Concat => "`::`",
            Self::Colon => "`:`",
            Self::Semicolon => "`;`",
            Self::OpenBrace => "`{`",
            Self::CloseBrace => "`}`",
            Self::OpenParen => "`(`",
            Self::CloseParen => "`)`",
            Self::OpenBracket => "`[`",
            Self::CloseBracket => "`]`",
            Self::Eof => "end of input",
        };
        f.write_str(symbol)
    }
}

/// A token with its 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// What the token is.
    pub kind: TokenKind,
    /// 1-based line of the token's first character.
    pub line: u32,
    /// 1-based column of the token's first character.
    pub col: u32,
}

/// Tokenize a (preprocessed) source string.
///
/// The returned stream always ends with an [`TokenKind::Eof`] token.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut r = Reader::new(source);
    let mut tokens = Vec::new();

    loop {
        r.forward_while(|b| b.is_ascii_whitespace());

        let (line, col) = (r.line(), r.col());
        let Some(b) = r.peek_byte() else { break };

        let kind = if reader::is_ident_start(b) {
            let start = r.offset();
            r.forward_while(reader::is_word);
            match r.slice_from(start) {
                "function" => TokenKind::Function,
                "return" => TokenKind::Return,
                name => TokenKind::Ident(name.to_string()),
            }
        } else if b.is_ascii_digit()
            || (b == b'-' && r.peek_at(1).is_some_and(|n| n.is_ascii_digit()))
        {
            read_number(&mut r)
        } else {
            read_operator(&mut r).ok_or(SyntaxError::UnexpectedChar {
                ch: b as char,
                line,
                col,
            })?
        };

        tokens.push(Token { kind, line, col });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line: r.line(),
        col: r.col(),
    });

    Ok(tokens)
}

fn read_number(r: &mut Reader<'_>) -> TokenKind {
    if r.forward_tag("0x").is_some() || r.forward_tag("0X").is_some() {
        let start = r.offset();
        r.forward_while(|b| b.is_ascii_hexdigit());
        return TokenKind::Literal(Literal::Hex(r.slice_from(start).to_string()));
    }

    let start = r.offset();
    r.eat(|b| b == b'-');
    r.forward_while(|b| b.is_ascii_digit());
    TokenKind::Literal(Literal::Bits(r.slice_from(start).to_string()))
}

fn read_operator(r: &mut Reader<'_>) -> Option<TokenKind> {
    // Longest match first: `<<<` must win over `<<`, `::` over `:`.
    let kind = if r.forward_tag("<<<").is_some() {
        TokenKind::Rotl
    } else if r.forward_tag(">>>").is_some() {
        TokenKind::Rotr
    } else if r.forward_tag("<<").is_some() {
        TokenKind::Shl
    } else if r.forward_tag(">>").is_some() {
        TokenKind::Shr
    } else if r.forward_tag("==").is_some() {
        TokenKind::Eq
    } else if r.forward_tag("!=").is_some() {
        TokenKind::Ne
    } else if r.forward_tag("&&").is_some() {
        TokenKind::AndAnd
    } else if r.forward_tag("||").is_some() {
        TokenKind::PipePipe
    } else if r.forward_tag("::").is_some() {
        TokenKind::Concat
    } else {
        let kind = match r.peek_byte()? {
            b'=' => TokenKind::Assign,
            b'|' => TokenKind::Pipe,
            b'&' => TokenKind::Amp,
            b'^' => TokenKind::Caret,
            b'~' => TokenKind::Tilde,
            b':' => TokenKind::Colon,
            b';' => TokenKind::Semicolon,
            b'{' => TokenKind::OpenBrace,
            b'}' => TokenKind::CloseBrace,
            b'(' => TokenKind::OpenParen,
            b')' => TokenKind::CloseParen,
            b'[' => TokenKind::OpenBracket,
            b']' => TokenKind::CloseBracket,
            _ => return None,
        };
        r.forward();
        kind
    };

    Some(kind)
}
