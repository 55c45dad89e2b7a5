//! Request tokenizer.
//!
//! Splits JSON request text into a flat sequence of typed tokens that point
//! back into the text by byte offset. Nothing is copied or allocated: tokens
//! are written into a caller-provided slice, and the caller decides how many
//! a request may use.
//!
//! The tokenizer is deliberately lenient about structure. Top-level
//! primitives and bare comma-separated sequences are accepted, so both
//! `{"a": 1, "b": 2}` and `"a", 1, "b", 2` tokenize:
//!
//! ```text
//! {"a": 1, "b": 2}   ->  OBJECT  STRING(a)  PRIMITIVE(1)  STRING(b)  PRIMITIVE(2)
//! ["x", "y"]         ->  ARRAY   STRING(x)  STRING(y)
//! "x"                ->  STRING(x)
//! ```
//!
//! Containers only mark structure; their children follow them in sequence.

use crate::error::TokenizeError;

/// Kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Quoted string. Offsets exclude the quotes.
    String,
    /// Number, `true`, `false`, `null` or any other bare word.
    Primitive,
    /// `[...]`; offsets include the brackets.
    Array,
    /// `{...}`; offsets include the braces.
    Object,
}

/// A typed, offset-bounded slice of the request text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

/// Marks a container whose closing bracket has not been seen yet.
const OPEN: usize = usize::MAX;

impl Token {
    /// Placeholder used to initialize token buffers.
    pub const EMPTY: Token = Token {
        kind: TokenKind::Primitive,
        start: 0,
        end: 0,
    };

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text covered by this token. Empty if the offsets do not fit `source`.
    pub fn text<'t>(&self, source: &'t str) -> &'t str {
        source.get(self.start..self.end).unwrap_or("")
    }
}

/// Tokenizes `text` into `tokens`, returning the number of tokens produced.
pub fn tokenize(text: &str, tokens: &mut [Token]) -> Result<usize, TokenizeError> {
    let bytes = text.as_bytes();
    let mut count = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'{' | b'[' => {
                let kind = if bytes[pos] == b'{' {
                    TokenKind::Object
                } else {
                    TokenKind::Array
                };
                push(tokens, &mut count, kind, pos, OPEN)?;
            }
            b'}' | b']' => {
                let kind = if bytes[pos] == b'}' {
                    TokenKind::Object
                } else {
                    TokenKind::Array
                };
                close_container(&mut tokens[..count], kind, pos)?;
            }
            b'"' => {
                let end = scan_string(bytes, pos)?;
                push(tokens, &mut count, TokenKind::String, pos + 1, end)?;
                pos = end;
            }
            b'\t' | b'\r' | b'\n' | b' ' | b':' | b',' => {}
            _ => {
                let end = scan_primitive(bytes, pos)?;
                push(tokens, &mut count, TokenKind::Primitive, pos, end)?;
                pos = end - 1;
            }
        }
        pos += 1;
    }

    if tokens[..count].iter().any(|token| token.end == OPEN) {
        return Err(TokenizeError::Partial);
    }
    Ok(count)
}

fn push(
    tokens: &mut [Token],
    count: &mut usize,
    kind: TokenKind,
    start: usize,
    end: usize,
) -> Result<(), TokenizeError> {
    let slot = tokens.get_mut(*count).ok_or(TokenizeError::NoMemory)?;
    *slot = Token { kind, start, end };
    *count += 1;
    Ok(())
}

/// Closes the innermost open container, which must be of `kind`.
fn close_container(tokens: &mut [Token], kind: TokenKind, pos: usize) -> Result<(), TokenizeError> {
    let open = tokens
        .iter_mut()
        .rev()
        .find(|token| token.end == OPEN)
        .ok_or(TokenizeError::Invalid(pos))?;
    if open.kind != kind {
        return Err(TokenizeError::Invalid(pos));
    }
    open.end = pos + 1;
    Ok(())
}

/// Returns the offset of the closing quote of the string opened at `open`.
fn scan_string(bytes: &[u8], open: usize) -> Result<usize, TokenizeError> {
    let mut pos = open + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'"' => return Ok(pos),
            b'\\' => {
                pos += 1;
                match bytes.get(pos) {
                    Some(b'"' | b'/' | b'\\' | b'b' | b'f' | b'r' | b'n' | b't') => {}
                    Some(b'u') => {
                        let hex = bytes.get(pos + 1..pos + 5).ok_or(TokenizeError::Partial)?;
                        if !hex.iter().all(u8::is_ascii_hexdigit) {
                            return Err(TokenizeError::Invalid(pos));
                        }
                        pos += 4;
                    }
                    Some(_) => return Err(TokenizeError::Invalid(pos)),
                    None => return Err(TokenizeError::Partial),
                }
            }
            b if b < 0x20 => return Err(TokenizeError::Invalid(pos)),
            _ => {}
        }
        pos += 1;
    }
    Err(TokenizeError::Partial)
}

/// Returns the offset one past the last byte of the primitive at `start`.
fn scan_primitive(bytes: &[u8], start: usize) -> Result<usize, TokenizeError> {
    let mut pos = start;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\t' | b'\r' | b'\n' | b' ' | b',' | b':' | b']' | b'}' => break,
            b if !(32..127).contains(&b) => return Err(TokenizeError::Invalid(pos)),
            _ => pos += 1,
        }
    }
    Ok(pos)
}

/// A tokenized request: the text plus the tokens pointing into it.
#[derive(Debug, Clone, Copy)]
pub struct Request<'r> {
    text: &'r str,
    tokens: &'r [Token],
}

impl<'r> Request<'r> {
    pub fn new(text: &'r str, tokens: &'r [Token]) -> Self {
        Self { text, tokens }
    }

    /// Tokenizes `text` into `buf` and wraps the result.
    pub fn parse(text: &'r str, buf: &'r mut [Token]) -> Result<Self, TokenizeError> {
        let count = tokenize(text, buf)?;
        Ok(Self {
            text,
            tokens: &buf[..count],
        })
    }

    pub fn text(&self) -> &'r str {
        self.text
    }

    pub fn tokens(&self) -> &'r [Token] {
        self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Kind of the token at `index`.
    pub fn kind(&self, index: usize) -> Option<TokenKind> {
        self.tokens.get(index).map(|token| token.kind)
    }

    /// Text of `token`, which must belong to this request.
    pub fn text_of(&self, token: &Token) -> &'r str {
        token.text(self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        let mut buf = [Token::EMPTY; 32];
        let count = tokenize(text, &mut buf).unwrap();
        buf[..count].iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_empty_input() {
        let mut buf = [Token::EMPTY; 4];
        assert_eq!(tokenize("", &mut buf), Ok(0));
        assert_eq!(tokenize("  \r\n", &mut buf), Ok(0));
    }

    #[test]
    fn test_object_tokens() {
        let text = r#"{"a": 1, "b": "x"}"#;
        let mut buf = [Token::EMPTY; 8];
        let count = tokenize(text, &mut buf).unwrap();
        assert_eq!(count, 5);
        assert_eq!(buf[0].kind, TokenKind::Object);
        assert_eq!(buf[0].text(text), text);
        assert_eq!(buf[1].kind, TokenKind::String);
        assert_eq!(buf[1].text(text), "a");
        assert_eq!(buf[2].kind, TokenKind::Primitive);
        assert_eq!(buf[2].text(text), "1");
        assert_eq!(buf[4].kind, TokenKind::String);
        assert_eq!(buf[4].text(text), "x");
    }

    #[test]
    fn test_array_tokens() {
        assert_eq!(
            kinds(r#"["x", "y"]"#),
            vec![TokenKind::Array, TokenKind::String, TokenKind::String]
        );
    }

    #[test]
    fn test_bare_sequences() {
        assert_eq!(kinds(r#""x""#), vec![TokenKind::String]);
        assert_eq!(kinds("-12.5"), vec![TokenKind::Primitive]);
        assert_eq!(
            kinds(r#""a", 1, "b", true"#),
            vec![
                TokenKind::String,
                TokenKind::Primitive,
                TokenKind::String,
                TokenKind::Primitive
            ]
        );
    }

    #[test]
    fn test_empty_string_token() {
        let text = r#""""#;
        let mut buf = [Token::EMPTY; 2];
        assert_eq!(tokenize(text, &mut buf), Ok(1));
        assert_eq!(buf[0].kind, TokenKind::String);
        assert!(buf[0].is_empty());
    }

    #[test]
    fn test_escapes_are_skipped_not_decoded() {
        let text = r#""a\"bA""#;
        let mut buf = [Token::EMPTY; 2];
        assert_eq!(tokenize(text, &mut buf), Ok(1));
        assert_eq!(buf[0].text(text), r#"a\"bA"#);
    }

    #[test]
    fn test_invalid_escape() {
        let mut buf = [Token::EMPTY; 2];
        assert!(matches!(
            tokenize(r#""a\q""#, &mut buf),
            Err(TokenizeError::Invalid(_))
        ));
        assert!(matches!(
            tokenize(r#""\u00g1""#, &mut buf),
            Err(TokenizeError::Invalid(_))
        ));
    }

    #[test]
    fn test_no_memory() {
        let mut buf = [Token::EMPTY; 2];
        assert_eq!(
            tokenize(r#"["a", "b"]"#, &mut buf),
            Err(TokenizeError::NoMemory)
        );
    }

    #[test]
    fn test_partial_input() {
        let mut buf = [Token::EMPTY; 8];
        assert_eq!(tokenize(r#"["a""#, &mut buf), Err(TokenizeError::Partial));
        assert_eq!(tokenize(r#""abc"#, &mut buf), Err(TokenizeError::Partial));
        assert_eq!(tokenize(r#"{"a": 1"#, &mut buf), Err(TokenizeError::Partial));
    }

    #[test]
    fn test_mismatched_brackets() {
        let mut buf = [Token::EMPTY; 8];
        assert!(matches!(
            tokenize(r#"["a"}"#, &mut buf),
            Err(TokenizeError::Invalid(4))
        ));
        assert!(matches!(
            tokenize("]", &mut buf),
            Err(TokenizeError::Invalid(0))
        ));
    }

    #[test]
    fn test_control_byte_in_primitive() {
        let mut buf = [Token::EMPTY; 8];
        assert!(matches!(
            tokenize("12\u{7f}", &mut buf),
            Err(TokenizeError::Invalid(2))
        ));
    }

    #[test]
    fn test_control_byte_in_string() {
        let mut buf = [Token::EMPTY; 8];
        assert!(matches!(
            tokenize("\"a\u{1}b\"", &mut buf),
            Err(TokenizeError::Invalid(2))
        ));
        assert!(matches!(
            tokenize("{\"Label\": \"a\nb\"}", &mut buf),
            Err(TokenizeError::Invalid(_))
        ));
        // Escaped control characters stay accepted.
        assert_eq!(tokenize("\"a\\nb\"", &mut buf), Ok(1));
    }

    #[test]
    fn test_request_parse() {
        let mut buf = [Token::EMPTY; 8];
        let request = Request::parse(r#"["a", "bc"]"#, &mut buf).unwrap();
        assert_eq!(request.len(), 3);
        assert_eq!(request.kind(0), Some(TokenKind::Array));
        assert_eq!(request.text_of(&request.tokens()[2]), "bc");
        assert_eq!(request.kind(3), None);
    }

    proptest! {
        #[test]
        fn prop_tokenize_never_panics(text in "\\PC{0,64}") {
            let mut buf = [Token::EMPTY; 16];
            if let Ok(count) = tokenize(&text, &mut buf) {
                for token in &buf[..count] {
                    prop_assert!(token.start <= token.end);
                    prop_assert!(token.end <= text.len());
                }
            }
        }

        #[test]
        fn prop_string_arrays_tokenize(names in proptest::collection::vec("[a-zA-Z_][a-zA-Z0-9_]{0,12}", 0..8)) {
            let quoted: Vec<String> = names.iter().map(|n| format!("\"{}\"", n)).collect();
            let text = format!("[{}]", quoted.join(", "));
            let mut buf = [Token::EMPTY; 16];
            let count = tokenize(&text, &mut buf).unwrap();
            prop_assert_eq!(count, names.len() + 1);
            for (token, name) in buf[1..count].iter().zip(&names) {
                prop_assert_eq!(token.kind, TokenKind::String);
                prop_assert_eq!(token.text(&text), name.as_str());
            }
        }
    }
}
