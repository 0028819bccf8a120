use objectir_common::{ErrorKind, IrError, Result, Span};
use objectir_ir::OpCode;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Single-char
    LBrace, RBrace, LParen, RParen, Comma, Colon,
    // Two-char
    Arrow, // '->'
    // Literals / identifiers
    Ident, Number, String,
    // Structural words (`module`, `class`, `method`, …)
    Keyword,
    // Opcode mnemonics, alias spellings included
    Instruction,
    Eof,
}


#[derive(Debug, Clone)]
pub struct Token { pub kind: TokenKind, pub lexeme: String, pub text: String, pub span: Span }


pub struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    cur: Option<char>,
    pos: usize,
    start: usize,
}


impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        let mut l = Self { src, chars: src.chars(), cur: None, pos: 0, start: 0 };
        l.advance();
        l
    }


    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut out = Vec::new();
        loop {
            let t = self.next_token()?;
            let eof = t.kind == TokenKind::Eof;
            out.push(t);
            if eof { break; }
        }
        Ok(out)
    }


    fn next_token(&mut self) -> Result<Token> {
        self.skip_ws_and_comments();
        self.start = self.pos;
        let ch = match self.cur { Some(c) => c, None => return Ok(self.make(TokenKind::Eof)) };
        match ch {
            '{' => { self.advance(); Ok(self.make(TokenKind::LBrace)) }
            '}' => { self.advance(); Ok(self.make(TokenKind::RBrace)) }
            '(' => { self.advance(); Ok(self.make(TokenKind::LParen)) }
            ')' => { self.advance(); Ok(self.make(TokenKind::RParen)) }
            ',' => { self.advance(); Ok(self.make(TokenKind::Comma)) }
            ':' => { self.advance(); Ok(self.make(TokenKind::Colon)) }
            '-' => {
                self.advance();
                if self.match_char('>') { return Ok(self.make(TokenKind::Arrow)); }
                // Negative numeric literal (-2, -3.14)
                if self.cur.map_or(false, |c| c.is_ascii_digit() || c == '.') { return self.number(); }
                Ok(self.make(TokenKind::Ident))
            }
            '"' => self.string(),
            c if c.is_ascii_digit() => self.number(),
            c if is_ident_start(c) => self.ident_or_kw(),
            _ => { self.advance(); Ok(self.make(TokenKind::Ident)) }
        }
    }

    fn string(&mut self) -> Result<Token> {
        // opening quote already in cur at entry
        self.advance();
        let mut s = String::new();
        while let Some(c) = self.cur {
            if c == '"' { self.advance(); break; }
            if c == '\\' { // simple escapes
                self.advance();
                match self.cur { Some('"') => { s.push('"'); self.advance(); }, Some('n') => { s.push('\n'); self.advance(); }, Some('t') => { s.push('\t'); self.advance(); }, Some(c2) => { s.push(c2); self.advance(); }, None => break }
            } else { s.push(c); self.advance(); }
        }
        let mut tok = self.make(TokenKind::String);
        tok.text = s;
        Ok(tok)
    }

    fn number(&mut self) -> Result<Token> {
        while self.cur.map_or(false, |c| c.is_ascii_digit() || c == '.') { self.advance(); }
        let lex = &self.src[self.start..self.pos];
        if lex.parse::<f64>().is_err() {
            return Err(IrError::new(ErrorKind::MalformedOperand, format!("invalid number '{}'", lex)));
        }
        Ok(self.make(TokenKind::Number))
    }

    fn ident_or_kw(&mut self) -> Result<Token> {
        while self.cur.map_or(false, is_ident_continue) { self.advance(); }
        let lex = &self.src[self.start..self.pos];
        let kind = if is_keyword(lex) {
            TokenKind::Keyword
        } else if OpCode::parse(lex).is_ok() {
            TokenKind::Instruction
        } else {
            TokenKind::Ident
        };
        Ok(self.make(kind))
    }


    fn skip_ws_and_comments(&mut self) {
        loop {
            match self.cur {
                Some(c) if c.is_whitespace() => { self.advance(); }
                Some('/') if self.peek() == Some('/') => { // line comment to EOL
                    while let Some(c) = self.cur { if c == '\n' { break; } self.advance(); }
                }
                _ => break,
            }
        }
    }


    fn make(&self, kind: TokenKind) -> Token {
        let lexeme = self.src[self.start..self.pos].to_string();
        let text = lexeme.clone();
        Token { kind, lexeme, text, span: Span::new(self.start, self.pos) }
    }


    fn advance(&mut self) {
        self.cur = self.chars.next();
        if let Some(c) = self.cur { self.pos += c.len_utf8(); } else { self.pos = self.src.len(); }
    }


    fn match_char(&mut self, want: char) -> bool {
        if self.cur == Some(want) { self.advance(); true } else { false }
    }


    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }
}


// Dots stay inside identifiers so qualified names (`System.Console`,
// `.ctor`) arrive as one token; backticks cover the generic-arity
// spellings (`List`1`).
fn is_ident_start(c: char) -> bool { c.is_ascii_alphabetic() || c == '_' || c == '.' }
fn is_ident_continue(c: char) -> bool { c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '`' }

fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "module" | "class" | "interface" | "struct" | "enum"
            | "method" | "field" | "property" | "constructor"
            | "static" | "virtual" | "abstract" | "private" | "public" | "protected"
            | "local" | "if" | "else" | "while" | "for" | "switch" | "case"
            | "return" | "implements" | "version"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).tokenize().unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn qualified_names_are_single_tokens() {
        let toks = Lexer::new("call System.Console.WriteLine ( string ) -> void").tokenize().unwrap();
        assert_eq!(toks[0].kind, TokenKind::Instruction);
        assert_eq!(toks[1].kind, TokenKind::Ident);
        assert_eq!(toks[1].lexeme, "System.Console.WriteLine");
        assert_eq!(toks[5].kind, TokenKind::Arrow);
    }

    #[test]
    fn strings_process_escapes() {
        let toks = Lexer::new(r#"ldstr "a\"b\n""#).tokenize().unwrap();
        assert_eq!(toks[1].kind, TokenKind::String);
        assert_eq!(toks[1].text, "a\"b\n");
    }

    #[test]
    fn negative_numbers_and_arrow() {
        let toks = Lexer::new("ldc -3.5 -> -").tokenize().unwrap();
        assert_eq!(toks[1].kind, TokenKind::Number);
        assert_eq!(toks[1].lexeme, "-3.5");
        assert_eq!(toks[2].kind, TokenKind::Arrow);
        assert_eq!(toks[3].kind, TokenKind::Ident);
    }

    #[test]
    fn keywords_beat_instructions() {
        assert_eq!(
            kinds("module class if while ldloc"),
            vec![
                TokenKind::Keyword,
                TokenKind::Keyword,
                TokenKind::Keyword,
                TokenKind::Keyword,
                TokenKind::Instruction,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let toks = Lexer::new("// header\nret // trailing\n").tokenize().unwrap();
        assert_eq!(toks[0].kind, TokenKind::Instruction);
        assert_eq!(toks[1].kind, TokenKind::Eof);
    }

    #[test]
    fn generic_arity_spelling_is_one_token() {
        let toks = Lexer::new("newobj System.Collections.Generic.List`1").tokenize().unwrap();
        assert_eq!(toks[1].lexeme, "System.Collections.Generic.List`1");
    }
}
