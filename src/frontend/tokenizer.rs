/// A significant source byte. Every other byte is a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Space,
    Tab,
    Linefeed,
    Eof,
}

impl Token {
    pub fn name(self) -> &'static str {
        match self {
            Token::Space => "SPACE",
            Token::Tab => "TAB",
            Token::Linefeed => "LF",
            Token::Eof => "EOF",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

/// Reads tokens one at a time from a raw byte slice.
///
/// `line` starts at 1 and advances after each linefeed is returned, so it
/// always names the line the next token will come from.
pub struct Tokenizer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Tokenizer {
            source,
            pos: 0,
            line: 1,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// Returns the next significant token, or `Eof` forever once exhausted.
    pub fn next_token(&mut self) -> Token {
        while let Some(&byte) = self.source.get(self.pos) {
            self.pos += 1;
            match byte {
                b' ' => return Token::Space,
                b'\t' => return Token::Tab,
                b'\n' => {
                    self.line += 1;
                    return Token::Linefeed;
                }
                _ => continue,
            }
        }
        Token::Eof
    }

    /// Drains the rest of the input, ending with a single `Eof`.
    pub fn tokenize(&mut self) -> Vec<Spanned> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let line = match token {
                Token::Linefeed => self.line - 1,
                _ => self.line,
            };
            tokens.push(Spanned { token, line });
            if token == Token::Eof {
                return tokens;
            }
        }
    }
}
