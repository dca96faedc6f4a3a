use crate::frontend::tokenizer::{Spanned, Token};

pub struct TokenDumper {
    pub color: bool,
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self { color: true }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const CYN: &'static str = "\x1b[36m";
    const YEL: &'static str = "\x1b[33m";
    const MAG: &'static str = "\x1b[35m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn dump(&self, tokens: &[Spanned]) {
        print!("{}", self.render(tokens));
    }

    pub fn render(&self, tokens: &[Spanned]) -> String {
        tokens.iter().map(|s| self.render_one(s)).collect()
    }

    fn render_one(&self, s: &Spanned) -> String {
        let colr = if self.color { Self::color(s.token) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        format!("[{:04}] {}{}{}\n", s.line, colr, s.token.name(), reset)
    }

    fn color(t: Token) -> &'static str {
        match t {
            Token::Space => Self::CYN,
            Token::Tab => Self::YEL,
            Token::Linefeed => Self::MAG,
            Token::Eof => Self::DIM,
        }
    }
}
