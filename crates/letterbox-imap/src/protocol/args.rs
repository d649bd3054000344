//! Command argument parser.
//!
//! Turns the byte range following a command's tag and verb into a structured
//! argument tree. The grammar is scanned left to right, longest available
//! token first: whitespace-separated atoms (classified into numbers and NIL),
//! backslash-escaped quoted strings, parenthesized lists parsed by recursive
//! descent, and `BODY[...]`/`BODY.PEEK[...]` section qualifiers recorded as a
//! tagged keyword/qualifier pair.
//!
//! The parser is pure: no I/O and no connection state. Semantic meaning
//! (whether an atom is a valid flag, whether a list is well shaped for a
//! verb) is the dispatcher's concern.

use crate::{Error, Result};

/// Hard ceiling on parser iterations, shared across the whole recursive
/// parse of one command line. Exceeding it fails that command, never the
/// process.
const PARSE_BUDGET: usize = 4096;

/// A single parsed command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// The literal token `NIL` (case-insensitive).
    Nil,
    /// An atom consisting entirely of ASCII digits.
    Number(u64),
    /// A text atom or unescaped quoted string.
    Atom(String),
    /// A parenthesized group of nested arguments.
    List(Vec<Argument>),
    /// A section-qualified atom: `BODY[...]` or `BODY.PEEK[...]`.
    ///
    /// Kept as a tagged pair so downstream code can tell "a list argument"
    /// apart from "a bracketed qualifier attached to an atom".
    Section {
        /// The qualified keyword, as written by the client.
        keyword: String,
        /// The arguments inside the brackets.
        qualifier: Vec<Argument>,
    },
}

impl Argument {
    /// Returns the textual content of an atom or quoted string.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Atom(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric value, if this argument is a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the nested arguments of a parenthesized list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Argument]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Renders an nstring-shaped argument as an astring.
    ///
    /// `NIL` becomes the literal text `NIL` and numbers render in decimal,
    /// mirroring how mailbox-name arguments are coerced. Lists and sections
    /// have no astring form.
    #[must_use]
    pub fn astring(&self) -> Option<String> {
        match self {
            Self::Nil => Some("NIL".to_string()),
            Self::Number(n) => Some(n.to_string()),
            Self::Atom(s) => Some(s.clone()),
            Self::List(_) | Self::Section { .. } => None,
        }
    }
}

/// What closes the argument list currently being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closer {
    /// End of the command line.
    End,
    /// A matching `)`.
    Paren,
    /// A matching `]`.
    Bracket,
}

/// Parses the argument bytes of one command line into an argument list.
pub fn parse_arguments(input: &[u8]) -> Result<Vec<Argument>> {
    let mut parser = Parser::new(input);
    parser.parse_list(Closer::End)
}

/// Recursive-descent parser state.
///
/// The iteration budget lives here so that every recursive call draws from
/// the same pool; a pathological command cannot reset it by nesting.
struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    budget: usize,
}

impl<'a> Parser<'a> {
    const fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            budget: PARSE_BUDGET,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn spend(&mut self) -> Result<()> {
        if self.budget == 0 {
            return Err(Error::parse(self.pos, "argument structure too complex"));
        }
        self.budget -= 1;
        Ok(())
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    /// Parses arguments until the given closer (or end of input) is reached.
    ///
    /// The closer byte itself is consumed, so on return `self.pos` sits
    /// immediately after the matching delimiter and the caller can resume
    /// scanning from there.
    fn parse_list(&mut self, closer: Closer) -> Result<Vec<Argument>> {
        let mut args = Vec::new();

        loop {
            self.spend()?;
            self.skip_spaces();

            let Some(byte) = self.peek() else {
                // End of line closes whatever is still open.
                return Ok(args);
            };

            match byte {
                // A bare ')' terminates the current list without being an
                // argument, including at the top level.
                b')' => {
                    self.pos += 1;
                    return Ok(args);
                }
                b']' if closer == Closer::Bracket => {
                    self.pos += 1;
                    return Ok(args);
                }
                b'"' => {
                    let arg = self.quoted_string()?;
                    args.push(arg);
                }
                b'(' => {
                    self.pos += 1;
                    let nested = self.parse_list(Closer::Paren)?;
                    args.push(Argument::List(nested));
                }
                _ if is_bare_char(byte) => {
                    let arg = self.atom_like()?;
                    args.push(arg);
                }
                _ => {
                    return Err(Error::parse(
                        self.pos,
                        format!("unexpected byte {byte:#04x} in arguments"),
                    ));
                }
            }
        }
    }

    /// Parses an atom, classifying numbers and NIL, and recognizing
    /// section-qualified `BODY[...]` / `BODY.PEEK[...]` forms.
    fn atom_like(&mut self) -> Result<Argument> {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if is_bare_char(byte) {
                self.pos += 1;
            } else {
                break;
            }
        }

        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| Error::parse(start, "invalid UTF-8 in atom"))?;

        if self.peek() == Some(b'[') && is_section_keyword(text) {
            self.pos += 1;
            let qualifier = self.parse_list(Closer::Bracket)?;
            return Ok(Argument::Section {
                keyword: text.to_string(),
                qualifier,
            });
        }

        if text.eq_ignore_ascii_case("NIL") {
            return Ok(Argument::Nil);
        }
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            // Digits wider than u64 degrade to a text atom.
            if let Ok(n) = text.parse::<u64>() {
                return Ok(Argument::Number(n));
            }
        }
        Ok(Argument::Atom(text.to_string()))
    }

    /// Parses a quoted string, unescaping backslash sequences.
    ///
    /// Escapes are consumed pairwise, so an escaped quote can never
    /// terminate the string.
    fn quoted_string(&mut self) -> Result<Argument> {
        let start = self.pos;
        self.pos += 1; // opening quote

        let mut text = Vec::new();
        loop {
            match self.peek() {
                None => return Err(Error::parse(start, "unterminated quoted string")),
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.spend()?;
                    self.pos += 1;
                    let Some(escaped) = self.peek() else {
                        return Err(Error::parse(start, "unterminated quoted string"));
                    };
                    text.push(escaped);
                    self.pos += 1;
                }
                Some(byte) => {
                    text.push(byte);
                    self.pos += 1;
                }
            }
        }

        let text = String::from_utf8(text)
            .map_err(|_| Error::parse(start, "invalid UTF-8 in quoted string"))?;
        Ok(Argument::Atom(text))
    }
}

/// Returns true for bytes that can appear in a bare (unquoted) token.
const fn is_bare_char(byte: u8) -> bool {
    !matches!(byte, b' ' | b'"' | b'(' | b')' | b'[' | b']' | b'{')
        && !byte.is_ascii_control()
}

/// Only `BODY` and `BODY.PEEK` take a bracketed section qualifier.
fn is_section_keyword(text: &str) -> bool {
    text.eq_ignore_ascii_case("BODY") || text.eq_ignore_ascii_case("BODY.PEEK")
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn atom(s: &str) -> Argument {
        Argument::Atom(s.to_string())
    }

    #[test]
    fn test_atoms_and_numbers() {
        let args = parse_arguments(b"INBOX 12345 NIL nil").unwrap();
        assert_eq!(
            args,
            vec![
                atom("INBOX"),
                Argument::Number(12345),
                Argument::Nil,
                Argument::Nil,
            ]
        );
    }

    #[test]
    fn test_quoted_string() {
        let args = parse_arguments(b"\"foo bar\" baz").unwrap();
        assert_eq!(args, vec![atom("foo bar"), atom("baz")]);
    }

    #[test]
    fn test_quoted_escape() {
        let args = parse_arguments(b"\"a\\\"b\"").unwrap();
        assert_eq!(args, vec![atom("a\"b")]);
    }

    #[test]
    fn test_escaped_backslash_then_quote() {
        // "a\\" is the two characters a and backslash; the closing quote
        // is preceded by an even number of backslashes.
        let args = parse_arguments(b"\"a\\\\\" tail").unwrap();
        assert_eq!(args, vec![atom("a\\"), atom("tail")]);
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        assert!(parse_arguments(b"\"never closed").is_err());
    }

    #[test]
    fn test_parenthesized_list() {
        let args = parse_arguments(b"(FLAGS UID)").unwrap();
        assert_eq!(args, vec![Argument::List(vec![atom("FLAGS"), atom("UID")])]);
    }

    #[test]
    fn test_nested_list_consumes_only_its_depth() {
        // The recursive call must stop at its matching ')' so the caller can
        // resume with the arguments after it.
        let args = parse_arguments(b"(A (B C) D) E").unwrap();
        assert_eq!(
            args,
            vec![
                Argument::List(vec![
                    atom("A"),
                    Argument::List(vec![atom("B"), atom("C")]),
                    atom("D"),
                ]),
                atom("E"),
            ]
        );
    }

    #[test]
    fn test_empty_list() {
        let args = parse_arguments(b"()").unwrap();
        assert_eq!(args, vec![Argument::List(vec![])]);
    }

    #[test]
    fn test_bare_close_paren_terminates() {
        // A stray ')' ends the top-level list without becoming an argument.
        let args = parse_arguments(b"A )").unwrap();
        assert_eq!(args, vec![atom("A")]);
    }

    #[test]
    fn test_section_qualifier() {
        let args = parse_arguments(b"BODY.PEEK[HEADER.FIELDS (From To)]").unwrap();
        assert_eq!(
            args,
            vec![Argument::Section {
                keyword: "BODY.PEEK".to_string(),
                qualifier: vec![
                    atom("HEADER.FIELDS"),
                    Argument::List(vec![atom("From"), atom("To")]),
                ],
            }]
        );
    }

    #[test]
    fn test_section_inside_fetch_items() {
        let args = parse_arguments(b"1:3 (UID BODY[TEXT])").unwrap();
        assert_eq!(
            args,
            vec![
                atom("1:3"),
                Argument::List(vec![
                    atom("UID"),
                    Argument::Section {
                        keyword: "BODY".to_string(),
                        qualifier: vec![atom("TEXT")],
                    },
                ]),
            ]
        );
    }

    #[test]
    fn test_section_keyword_is_case_insensitive() {
        let args = parse_arguments(b"body[TEXT]").unwrap();
        assert!(matches!(args[0], Argument::Section { .. }));
    }

    #[test]
    fn test_bracket_after_other_atom_is_error() {
        assert!(parse_arguments(b"ENVELOPE[1]").is_err());
    }

    #[test]
    fn test_literal_brace_is_error() {
        // Literals are not supported by this engine; the command fails
        // instead of the process.
        assert!(parse_arguments(b"{12}").is_err());
    }

    #[test]
    fn test_budget_exhaustion_is_typed_error() {
        let mut input = Vec::new();
        for _ in 0..5000 {
            input.extend_from_slice(b"a ");
        }
        let err = parse_arguments(&input).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("too complex"));
    }

    #[test]
    fn test_deep_nesting_stays_within_budget() {
        let input = b"(((((((((A)))))))))";
        let args = parse_arguments(input).unwrap();
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_arguments(b"").unwrap(), Vec::new());
        assert_eq!(parse_arguments(b"   ").unwrap(), Vec::new());
    }

    #[test]
    fn test_number_overflow_degrades_to_atom() {
        let args = parse_arguments(b"99999999999999999999999999").unwrap();
        assert_eq!(args, vec![atom("99999999999999999999999999")]);
    }

    #[test]
    fn test_astring_coercion() {
        assert_eq!(Argument::Nil.astring().unwrap(), "NIL");
        assert_eq!(Argument::Number(7).astring().unwrap(), "7");
        assert_eq!(atom("INBOX").astring().unwrap(), "INBOX");
        assert!(Argument::List(vec![]).astring().is_none());
    }
}
