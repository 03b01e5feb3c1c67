pub mod token;


pub use token::{Token, TokenKind};

use crate::error::LexError;
use crate::source::{Position, Source};

/// Hand-written tokenizer pulling characters from a [`Source`] with exactly
/// one character of lookahead. Tokens are produced lazily, one per call to
/// [`Lexer::next`].
pub struct Lexer<'src> {
    source: &'src mut Source,
    current: Option<char>,
    current_pos: Position,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src mut Source) -> Self {
        let current_pos = source.position();
        let current = source.next();
        Self {
            source,
            current,
            current_pos,
        }
    }

    /// Produce the next token.
    pub fn next(&mut self) -> Result<Token, LexError> {
        self.skip_space_and_comments();

        let start = self.current_pos;
        let ch = match self.current {
            Some(ch) => ch,
            None => return Ok(Token::new(TokenKind::Eof, start)),
        };

        if ch.is_alphabetic() || ch == '_' {
            Ok(self.keyword_or_identifier(start))
        } else if ch.is_ascii_digit() {
            self.int_const(start)
        } else if ch == '"' {
            self.string_const(start)
        } else {
            self.operator(start, ch)
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current;
        self.current_pos = self.source.position();
        self.current = self.source.next();
        ch
    }

    fn skip_space_and_comments(&mut self) {
        loop {
            match self.current {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                // `#` comments run to the end of the line.
                Some('#') => {
                    while let Some(ch) = self.current {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn keyword_or_identifier(&mut self, start: Position) -> Token {
        let mut name = String::new();
        while let Some(ch) = self.current {
            if ch.is_alphanumeric() || ch == '_' {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        match TokenKind::keyword(&name) {
            Some(kind) => Token::new(kind, start),
            None => Token::new(TokenKind::Identifier(name), start),
        }
    }

    fn int_const(&mut self, start: Position) -> Result<Token, LexError> {
        let mut text = String::new();
        while let Some(ch) = self.current {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        // A letter glued to the digit run is not a separate token.
        if let Some(ch) = self.current {
            if ch.is_alphabetic() || ch == '_' {
                text.push(ch);
                return Err(LexError::InvalidNumber {
                    text,
                    position: start,
                });
            }
        }
        match text.parse::<i32>() {
            Ok(value) => Ok(Token::new(TokenKind::Integer(value), start)),
            Err(_) => Err(LexError::IntegerOverflow {
                text,
                position: start,
            }),
        }
    }

    fn string_const(&mut self, start: Position) -> Result<Token, LexError> {
        self.advance(); // opening quote
        let mut value = String::new();
        while let Some(ch) = self.advance() {
            match ch {
                '"' => return Ok(Token::new(TokenKind::Str(value), start)),
                '\\' => {
                    let escaped = match self.advance() {
                        Some(escaped) => escaped,
                        None => break,
                    };
                    value.push(match escaped {
                        'n' => '\n',
                        'r' => '\r',
                        'a' => '\u{0007}',
                        'b' => '\u{0008}',
                        't' => '\t',
                        // Any other escaped character stands for itself.
                        other => other,
                    });
                }
                _ => value.push(ch),
            }
        }
        Err(LexError::UnterminatedString { position: start })
    }

    fn operator(&mut self, start: Position, ch: char) -> Result<Token, LexError> {
        use TokenKind::*;

        self.advance();
        let kind = match ch {
            '+' => Plus,
            '*' => Star,
            '/' => Slash,
            '%' => Percent,
            '^' => Caret,
            '~' => Tilde,
            '(' => LeftParen,
            ')' => RightParen,
            '[' => LeftBracket,
            ']' => RightBracket,
            '{' => LeftBrace,
            '}' => RightBrace,
            ':' => Colon,
            ';' => Semicolon,
            ',' => Comma,
            '!' => self.choose_on_next(&[('=', NotEqual)], Bang),
            '&' => self.choose_on_next(&[('&', AndAnd)], Ampersand),
            '|' => self.choose_on_next(&[('|', OrOr)], Pipe),
            '<' => self.choose_on_next(&[('<', ShiftLeft), ('=', LessEqual)], Less),
            '>' => self.choose_on_next(&[('>', ShiftRight), ('=', GreaterEqual)], Greater),
            '=' => self.choose_on_next(&[('=', Equal)], Assign),
            '-' => self.choose_on_next(&[('>', Arrow)], Minus),
            '.' => {
                // `..` is the range separator; a lone `.` means nothing.
                if self.current == Some('.') {
                    self.advance();
                    DotDot
                } else {
                    return Err(LexError::UnexpectedCharacter {
                        ch: '.',
                        position: start,
                    });
                }
            }
            other => {
                return Err(LexError::UnexpectedCharacter {
                    ch: other,
                    position: start,
                })
            }
        };
        Ok(Token::new(kind, start))
    }

    /// Maximal munch over two-character operators: peek at the character
    /// after the one just consumed and pick the longest match.
    fn choose_on_next(&mut self, pairs: &[(char, TokenKind)], fallback: TokenKind) -> TokenKind {
        for (follower, kind) in pairs {
            if self.current == Some(*follower) {
                self.advance();
                return kind.clone();
            }
        }
        fallback
    }
}

/// Tokenize an entire source. The parser pulls tokens lazily instead; this
/// exists for tests and tools.
pub fn lex(source: &mut Source) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next()?;
        let eof = token.kind == TokenKind::Eof;
        tokens.push(token);
        if eof {
            return Ok(tokens);
        }
    }
}
