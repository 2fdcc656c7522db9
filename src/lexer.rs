use crate::token::{Token, TokenKind};

/// Characters that may begin an operator or assignment; a one-character peek
/// decides between the single- and two-character forms.
const OPERATOR_FIRSTS: &[char] = &['+', '-', '*', '/', '<', '>', '&', '|', '!', '=', '~'];

fn operator_kind(lexeme: &str) -> Option<TokenKind> {
    let kind = match lexeme {
        "=" => TokenKind::Assign,
        "==" => TokenKind::Eq,
        "!=" => TokenKind::Neq,
        ">" => TokenKind::Gt,
        "<" => TokenKind::Lt,
        ">=" => TokenKind::Geq,
        "<=" => TokenKind::Leq,
        "+" => TokenKind::Plus,
        "-" => TokenKind::Minus,
        "*" => TokenKind::Multiply,
        "/" => TokenKind::Divide,
        "!" => TokenKind::Bang,
        "&" => TokenKind::BitAnd,
        "|" => TokenKind::BitOr,
        "~" => TokenKind::BitNot,
        "&&" => TokenKind::LogicalAnd,
        "||" => TokenKind::LogicalOr,
        _ => return None,
    };
    Some(kind)
}

fn keyword_kind(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "var" => TokenKind::Var,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "return" => TokenKind::Return,
        "while" => TokenKind::While,
        "loop" => TokenKind::Loop,
        "fun" => TokenKind::Fun,
        "in" => TokenKind::In,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "int" => TokenKind::TypeInt,
        "uint" => TokenKind::TypeUint,
        "bool" => TokenKind::TypeBool,
        _ => return None,
    };
    Some(kind)
}

/// On-demand scanner over a source string. Owns a byte cursor plus line
/// bookkeeping for 1-based `(row, col)` token locations; looks at most one
/// character past the current one.
///
/// `next_token` is total. Unrecognised input becomes an `Illegal` token, and
/// end of input yields `Eof` after resetting the cursors so the lexer can be
/// driven through the source again.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    line_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 0,
            line_start: 0,
        }
    }

    pub fn next_token(&mut self) -> Token {
        while let Some(ch) = self.peek_char() {
            let (row, col) = self.location();
            match ch {
                '@' => self.skip_comment(),
                '\n' => {
                    self.consume_char();
                    self.line += 1;
                    self.line_start = self.pos;
                }
                c if c.is_whitespace() => {
                    self.consume_char();
                }
                c if OPERATOR_FIRSTS.contains(&c) => {
                    return self.read_operator_or_assign(c, row, col);
                }
                '(' => return self.single_char_token(TokenKind::LParen, ch, row, col),
                ')' => return self.single_char_token(TokenKind::RParen, ch, row, col),
                '{' => return self.single_char_token(TokenKind::LBrace, ch, row, col),
                '}' => return self.single_char_token(TokenKind::RBrace, ch, row, col),
                '[' => return self.single_char_token(TokenKind::LBracket, ch, row, col),
                ']' => return self.single_char_token(TokenKind::RBracket, ch, row, col),
                ';' => return self.single_char_token(TokenKind::Semicolon, ch, row, col),
                ':' => return self.single_char_token(TokenKind::Colon, ch, row, col),
                ',' => return self.single_char_token(TokenKind::Comma, ch, row, col),
                c if c.is_alphabetic() || c == '_' => {
                    let lexeme = self.read_identifier();
                    let kind = keyword_kind(lexeme).unwrap_or(TokenKind::Identifier);
                    return Token::new(kind, lexeme, row, col);
                }
                c if c.is_ascii_digit() => {
                    let lexeme = self.read_literal_number();
                    return Token::new(TokenKind::LiteralInt, lexeme, row, col);
                }
                c => {
                    self.consume_char();
                    return Token::new(TokenKind::Illegal, c.to_string(), row, col);
                }
            }
        }

        self.reset_cursors();
        Token::new(TokenKind::Eof, "", 1, 1)
    }

    fn reset_cursors(&mut self) {
        self.pos = 0;
        self.line = 0;
        self.line_start = 0;
    }

    // Skips `@` up to and including the newline; end of input also terminates
    // the comment.
    fn skip_comment(&mut self) {
        while let Some(ch) = self.consume_char() {
            if ch == '\n' {
                self.line += 1;
                self.line_start = self.pos;
                break;
            }
        }
    }

    fn single_char_token(&mut self, kind: TokenKind, ch: char, row: usize, col: usize) -> Token {
        self.consume_char();
        Token::new(kind, ch.to_string(), row, col)
    }

    fn read_operator_or_assign(&mut self, first: char, row: usize, col: usize) -> Token {
        self.consume_char();
        if let Some(second) = self.peek_char() {
            let mut two = String::with_capacity(2);
            two.push(first);
            two.push(second);
            if let Some(kind) = operator_kind(&two) {
                self.consume_char();
                return Token::new(kind, two, row, col);
            }
        }
        let lexeme = first.to_string();
        // Single operator characters always map: OPERATOR_FIRSTS is a subset
        // of the operator table's one-character lexemes.
        let kind = operator_kind(&lexeme).unwrap_or(TokenKind::Illegal);
        Token::new(kind, lexeme, row, col)
    }

    fn read_identifier(&mut self) -> &'a str {
        let start = self.pos;
        self.consume_while(|c| c.is_alphanumeric() || c == '_');
        &self.input[start..self.pos]
    }

    // Digits plus `.`; the dot is kept in the lexeme so the parser can reject
    // non-integer literals with a located diagnostic.
    fn read_literal_number(&mut self) -> &'a str {
        let start = self.pos;
        self.consume_while(|c| c.is_ascii_digit() || c == '.');
        &self.input[start..self.pos]
    }

    fn consume_while<P>(&mut self, keep: P)
    where
        P: Fn(char) -> bool,
    {
        while let Some(c) = self.peek_char() {
            if !keep(c) {
                break;
            }
            self.consume_char();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn location(&self) -> (usize, usize) {
        (self.line + 1, self.pos - self.line_start + 1)
    }
}
