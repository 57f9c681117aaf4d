use crate::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    Number(String),
    /// A `/** ... */` comment, delimiters included.
    Doc(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Lt,
    Gt,
    Comma,
    Dot,
    Colon,
    Semi,
    Eq,
    At,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) position: usize,
    /// A line break separates this token from the previous one.
    pub(crate) newline_before: bool,
}

impl Token {
    pub(crate) fn is_ident(&self, text: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(ident) if ident == text)
    }
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let eof = token.kind == TokenKind::Eof;
        tokens.push(token);
        if eof {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            input: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Skips whitespace and non-doc comments; returns whether a newline was crossed.
    fn skip_trivia(&mut self) -> Result<bool, ParseError> {
        let mut newline = false;
        loop {
            while let Some(b) = self.peek() {
                match b {
                    b'\n' => newline = true,
                    b' ' | b'\t' | b'\r' | 0x0C => {}
                    _ => break,
                }
                self.pos += 1;
            }

            if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'/') {
                while let Some(b) = self.peek() {
                    if b == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }

            let is_block = self.peek() == Some(b'/') && self.peek_at(1) == Some(b'*');
            let is_doc = is_block && self.peek_at(2) == Some(b'*') && self.peek_at(3) != Some(b'/');
            if is_block && !is_doc {
                self.skip_block_comment()?;
                continue;
            }

            return Ok(newline);
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        self.pos += 2;
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(b'*'), Some(b'/')) => {
                    self.pos += 2;
                    return Ok(());
                }
                (Some(_), _) => self.pos += 1,
                (None, _) => return Err(ParseError::new("unterminated block comment", start)),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        let newline_before = self.skip_trivia()?;
        let position = self.pos;
        let Some(b) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                position,
                newline_before,
            });
        };

        let single = |kind| Some(kind);
        let punct = match b {
            b'(' => single(TokenKind::LParen),
            b')' => single(TokenKind::RParen),
            b'{' => single(TokenKind::LBrace),
            b'}' => single(TokenKind::RBrace),
            b'<' => single(TokenKind::Lt),
            b'>' => single(TokenKind::Gt),
            b',' => single(TokenKind::Comma),
            b'.' => single(TokenKind::Dot),
            b':' => single(TokenKind::Colon),
            b';' => single(TokenKind::Semi),
            b'=' => single(TokenKind::Eq),
            b'@' => single(TokenKind::At),
            _ => None,
        };

        let kind = if let Some(kind) = punct {
            self.pos += 1;
            kind
        } else if b == b'/' {
            // Only doc comments survive `skip_trivia`.
            self.skip_block_comment()?;
            TokenKind::Doc(self.src[position..self.pos].to_string())
        } else if b == b'"' {
            TokenKind::Str(self.lex_string()?)
        } else if b.is_ascii_digit() {
            let start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
                self.pos += 1;
            }
            TokenKind::Number(self.src[start..self.pos].to_string())
        } else if is_ident_start(b) {
            let start = self.pos;
            self.pos += 1;
            while matches!(self.peek(), Some(c) if is_ident_part(c)) {
                self.pos += 1;
            }
            TokenKind::Ident(self.src[start..self.pos].to_string())
        } else {
            let ch = self.src[position..].chars().next().unwrap_or('?');
            return Err(ParseError::new(
                format!("unexpected character `{ch}`"),
                position,
            ));
        };

        Ok(Token {
            kind,
            position,
            newline_before,
        })
    }

    /// Lexes a string literal and returns its raw contents (escapes kept as written).
    fn lex_string(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                Some(b'\\') => self.pos += 2,
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(self.src[start + 1..self.pos - 1].to_string());
                }
                Some(b'\n') | None => {
                    return Err(ParseError::new("unterminated string literal", start));
                }
                Some(_) => self.pos += 1,
            }
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_part(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_doc_comments_and_skips_plain_ones() {
        let kinds = kinds("/* plain */ /** doc */ // line\nfoo");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Doc("/** doc */".into()),
                TokenKind::Ident("foo".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn records_line_breaks() {
        let tokens = tokenize("a\n(b)").unwrap();
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
        assert!(!tokens[2].newline_before);
    }

    #[test]
    fn string_keeps_escapes() {
        assert_eq!(
            kinds(r#""a\"b""#),
            vec![TokenKind::Str(r#"a\"b"#.into()), TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("\"abc").unwrap_err();
        assert_eq!(err.position(), 0);
    }
}
