//! Byte-level lexer for the subset.
//!
//! Skips whitespace and `//`/`/* */` comments, recognizes keywords through
//! the shared lookup table, and scans sized literals (`4'b1010`, `8'hFF`).
//! Malformed input produces a [`Tok::Error`] token and a diagnostic; the
//! token stream always ends with [`Tok::Eof`].

use crate::token::{lookup_keyword, Tok, Token};
use galena_diagnostics::{DiagCode, Diagnostic, DiagnosticSink};
use galena_source::{FileId, Span};

/// Lexes `source` into a token stream terminated by [`Tok::Eof`].
pub fn lex(source: &str, file: FileId, sink: &DiagnosticSink) -> Vec<Token> {
    let mut lexer = Lexer {
        src: source.as_bytes(),
        pos: 0,
        file,
        sink,
    };
    lexer.run()
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    file: FileId,
    sink: &'a DiagnosticSink,
}

impl Lexer<'_> {
    fn run(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            if self.pos >= self.src.len() {
                tokens.push(self.token(Tok::Eof, self.pos));
                return tokens;
            }
            tokens.push(self.next_token());
        }
    }

    fn peek(&self) -> u8 {
        self.src.get(self.pos).copied().unwrap_or(0)
    }

    fn peek2(&self) -> u8 {
        self.src.get(self.pos + 1).copied().unwrap_or(0)
    }

    fn token(&self, kind: Tok, start: usize) -> Token {
        Token {
            kind,
            span: Span::new(self.file, start as u32, self.pos as u32),
        }
    }

    fn error(&self, msg: &str, start: usize) {
        self.sink.emit(Diagnostic::error(
            DiagCode::LEX,
            msg,
            Span::new(self.file, start as u32, self.pos as u32),
        ));
    }

    fn skip_trivia(&mut self) {
        loop {
            while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.peek() == b'/' && self.peek2() == b'/' {
                while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            if self.peek() == b'/' && self.peek2() == b'*' {
                let start = self.pos;
                self.pos += 2;
                loop {
                    if self.pos >= self.src.len() {
                        self.error("unterminated block comment", start);
                        return;
                    }
                    if self.src[self.pos] == b'*' && self.peek2() == b'/' {
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            // Compiler directives (`timescale etc.) are outside the subset.
            if self.peek() == b'`' {
                let start = self.pos;
                while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
                    self.pos += 1;
                }
                self.error("compiler directives are not supported", start);
                continue;
            }
            return;
        }
    }

    fn next_token(&mut self) -> Token {
        let start = self.pos;
        let b = self.peek();

        if b.is_ascii_alphabetic() || b == b'_' {
            return self.lex_word(start);
        }
        if b.is_ascii_digit() {
            return self.lex_number(start);
        }
        if b == b'\'' {
            // Unsized based literal: 'b1010
            let base = self.peek2().to_ascii_lowercase();
            if matches!(base, b'b' | b'o' | b'd' | b'h') {
                self.pos += 2;
                self.eat_based_digits(base);
                return self.token(Tok::SizedLiteral, start);
            }
        }
        if b == b'$' {
            self.pos += 1;
            while self.pos < self.src.len() && is_word_byte(self.src[self.pos]) {
                self.pos += 1;
            }
            return self.token(Tok::SystemIdent, start);
        }

        self.lex_operator(start)
    }

    fn lex_word(&mut self, start: usize) -> Token {
        while self.pos < self.src.len() && is_word_byte(self.src[self.pos]) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("");
        let kind = lookup_keyword(text).unwrap_or(Tok::Identifier);
        self.token(kind, start)
    }

    fn lex_number(&mut self, start: usize) -> Token {
        self.eat_decimal_digits();
        if self.peek() == b'\'' {
            let base = self.peek2().to_ascii_lowercase();
            if matches!(base, b'b' | b'o' | b'd' | b'h') {
                self.pos += 2;
                self.eat_based_digits(base);
                return self.token(Tok::SizedLiteral, start);
            }
            self.pos += 1;
            self.error("expected base letter (b, o, d, or h) after \"'\"", start);
            return self.token(Tok::Error, start);
        }
        self.token(Tok::IntLiteral, start)
    }

    fn eat_decimal_digits(&mut self) {
        while self.pos < self.src.len()
            && (self.src[self.pos].is_ascii_digit() || self.src[self.pos] == b'_')
        {
            self.pos += 1;
        }
    }

    fn eat_based_digits(&mut self, base: u8) {
        while self.pos < self.src.len() {
            let c = self.src[self.pos].to_ascii_lowercase();
            let ok = match base {
                b'b' => matches!(c, b'0' | b'1' | b'_'),
                b'o' => matches!(c, b'0'..=b'7' | b'_'),
                b'd' => c.is_ascii_digit() || c == b'_',
                b'h' => c.is_ascii_hexdigit() || c == b'_',
                _ => false,
            };
            if !ok {
                break;
            }
            self.pos += 1;
        }
    }

    fn lex_operator(&mut self, start: usize) -> Token {
        let b = self.src[self.pos];
        self.pos += 1;
        let kind = match b {
            b'(' => Tok::LParen,
            b')' => Tok::RParen,
            b'[' => Tok::LBracket,
            b']' => Tok::RBracket,
            b'{' => Tok::LBrace,
            b'}' => Tok::RBrace,
            b',' => Tok::Comma,
            b';' => Tok::Semicolon,
            b':' => Tok::Colon,
            b'.' => Tok::Dot,
            b'#' => Tok::Hash,
            b'@' => Tok::At,
            b'?' => Tok::Question,
            b'+' => Tok::Plus,
            b'-' => Tok::Minus,
            b'/' => Tok::Slash,
            b'%' => Tok::Percent,
            b'*' => {
                if self.peek() == b'*' {
                    self.pos += 1;
                    Tok::StarStar
                } else {
                    Tok::Star
                }
            }
            b'=' => {
                if self.peek() == b'=' {
                    self.pos += 1;
                    Tok::EqEq
                } else {
                    Tok::Equals
                }
            }
            b'!' => {
                if self.peek() == b'=' {
                    self.pos += 1;
                    Tok::BangEq
                } else {
                    Tok::Bang
                }
            }
            b'<' => {
                if self.peek() == b'=' {
                    self.pos += 1;
                    Tok::Le
                } else if self.peek() == b'<' {
                    self.pos += 1;
                    if self.peek() == b'<' {
                        self.pos += 1;
                        Tok::AShl
                    } else {
                        Tok::Shl
                    }
                } else {
                    Tok::Lt
                }
            }
            b'>' => {
                if self.peek() == b'=' {
                    self.pos += 1;
                    Tok::Ge
                } else if self.peek() == b'>' {
                    self.pos += 1;
                    if self.peek() == b'>' {
                        self.pos += 1;
                        Tok::AShr
                    } else {
                        Tok::Shr
                    }
                } else {
                    Tok::Gt
                }
            }
            b'&' => {
                if self.peek() == b'&' {
                    self.pos += 1;
                    Tok::AmpAmp
                } else {
                    Tok::Amp
                }
            }
            b'|' => {
                if self.peek() == b'|' {
                    self.pos += 1;
                    Tok::PipePipe
                } else {
                    Tok::Pipe
                }
            }
            b'^' => {
                if self.peek() == b'~' {
                    self.pos += 1;
                    Tok::TildeCaret
                } else {
                    Tok::Caret
                }
            }
            b'~' => match self.peek() {
                b'^' => {
                    self.pos += 1;
                    Tok::TildeCaret
                }
                b'&' => {
                    self.pos += 1;
                    Tok::TildeAmp
                }
                b'|' => {
                    self.pos += 1;
                    Tok::TildePipe
                }
                _ => Tok::Tilde,
            },
            b'"' => {
                while self.pos < self.src.len()
                    && self.src[self.pos] != b'"'
                    && self.src[self.pos] != b'\n'
                {
                    self.pos += 1;
                }
                if self.peek() == b'"' {
                    self.pos += 1;
                }
                self.error("string literals are not supported", start);
                Tok::Error
            }
            _ => {
                self.error(&format!("unrecognized character '{}'", b as char), start);
                Tok::Error
            }
        };
        self.token(kind, start)
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_of(source: &str) -> Vec<Tok> {
        let sink = DiagnosticSink::new();
        let tokens = lex(source, FileId::from_raw(0), &sink);
        assert!(!sink.has_errors(), "unexpected errors: {:?}", sink.drain());
        tokens.iter().map(|t| t.kind).collect()
    }

    fn kinds_with_errors(source: &str) -> (Vec<Tok>, usize) {
        let sink = DiagnosticSink::new();
        let tokens = lex(source, FileId::from_raw(0), &sink);
        (tokens.iter().map(|t| t.kind).collect(), sink.error_count())
    }

    #[test]
    fn empty_and_whitespace() {
        assert_eq!(kinds_of(""), vec![Tok::Eof]);
        assert_eq!(kinds_of("  \t\n "), vec![Tok::Eof]);
    }

    #[test]
    fn module_header() {
        assert_eq!(
            kinds_of("module nand_gate(input inA, output outY);"),
            vec![
                Tok::Module,
                Tok::Identifier,
                Tok::LParen,
                Tok::Input,
                Tok::Identifier,
                Tok::Comma,
                Tok::Output,
                Tok::Identifier,
                Tok::RParen,
                Tok::Semicolon,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn comments_skipped() {
        assert_eq!(
            kinds_of("wire // trailing\n a /* inline\nmultiline */ ;"),
            vec![Tok::Wire, Tok::Identifier, Tok::Semicolon, Tok::Eof]
        );
    }

    #[test]
    fn sized_literals() {
        assert_eq!(
            kinds_of("4'b1010 8'hFF 16'd255 'b1"),
            vec![
                Tok::SizedLiteral,
                Tok::SizedLiteral,
                Tok::SizedLiteral,
                Tok::SizedLiteral,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn unsized_literal_with_separator() {
        assert_eq!(kinds_of("1_000"), vec![Tok::IntLiteral, Tok::Eof]);
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds_of("~ & | ^ ! && || == != < <= > >= << >> + - *"),
            vec![
                Tok::Tilde,
                Tok::Amp,
                Tok::Pipe,
                Tok::Caret,
                Tok::Bang,
                Tok::AmpAmp,
                Tok::PipePipe,
                Tok::EqEq,
                Tok::BangEq,
                Tok::Lt,
                Tok::Le,
                Tok::Gt,
                Tok::Ge,
                Tok::Shl,
                Tok::Shr,
                Tok::Plus,
                Tok::Minus,
                Tok::Star,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn out_of_subset_operators_still_lex() {
        assert_eq!(
            kinds_of("/ % ** <<< >>> ~& ~| ~^"),
            vec![
                Tok::Slash,
                Tok::Percent,
                Tok::StarStar,
                Tok::AShl,
                Tok::AShr,
                Tok::TildeAmp,
                Tok::TildePipe,
                Tok::TildeCaret,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn nonblocking_lexes_as_le() {
        assert_eq!(
            kinds_of("count <= count + 1;"),
            vec![
                Tok::Identifier,
                Tok::Le,
                Tok::Identifier,
                Tok::Plus,
                Tok::IntLiteral,
                Tok::Semicolon,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn system_identifier() {
        assert_eq!(kinds_of("$display"), vec![Tok::SystemIdent, Tok::Eof]);
    }

    #[test]
    fn directive_reports_error() {
        let (kinds, errors) = kinds_with_errors("`timescale 1ns/1ps\nmodule m;");
        assert_eq!(kinds[0], Tok::Module);
        assert_eq!(errors, 1);
    }

    #[test]
    fn unterminated_block_comment() {
        let (kinds, errors) = kinds_with_errors("/* oops");
        assert_eq!(*kinds.last().unwrap(), Tok::Eof);
        assert_eq!(errors, 1);
    }

    #[test]
    fn tick_without_base_is_error() {
        let (kinds, errors) = kinds_with_errors("4'q0");
        assert!(kinds.contains(&Tok::Error));
        assert_eq!(errors, 1);
    }

    #[test]
    fn unrecognized_character() {
        let (kinds, errors) = kinds_with_errors("\\foo");
        assert!(kinds.contains(&Tok::Error));
        assert!(errors >= 1);
    }

    #[test]
    fn spans_track_bytes() {
        let sink = DiagnosticSink::new();
        let tokens = lex("module top", FileId::from_raw(0), &sink);
        assert_eq!((tokens[0].span.start, tokens[0].span.end), (0, 6));
        assert_eq!((tokens[1].span.start, tokens[1].span.end), (7, 10));
    }
}
