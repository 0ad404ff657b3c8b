//! Parser for the event-filter condition language.
//!
//! The language is a conjunction of `field = value` conditions separated by
//! `&`. A value is a bare token, a quoted string, or a named set such as
//! `any(1, 2, 3)`:
//!
//! ```text
//! type=1 & room=any(chat.example.com#11, chat.example.com#22) & class=user
//! ```
//!
//! Field names are restricted to `[0-9a-z_]`; bare values additionally
//! accept `.`, `#` and `-` so room identifiers can be written unquoted.
//! Upper-case ASCII letters are accepted anywhere and folded to lower case.
//! Quoted strings support exactly two escapes, `\"` and `\\`. Whitespace is
//! insignificant around separators.
//!
//! The parser is a single forward pass over the input with an explicit
//! state machine — no backtracking, one output allocation per token. Errors
//! carry the 1-based line and column of the offending character.

use thiserror::Error;

// ─── Output ──────────────────────────────────────────────────────────────────

/// The value side of one parsed condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionValue {
    /// A single bare or quoted token.
    Scalar(String),
    /// A named set, e.g. `any(1, 2)`.
    Set {
        /// The set operator name (`any`, `all`, ...). Validated by the
        /// compiler, not the parser.
        name: String,
        /// The set members, in source order.
        members: Vec<String>,
    },
}

/// One `field = value` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// The field name, case-folded.
    pub field: String,
    /// The parsed value.
    pub value: ConditionValue,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// What went wrong while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// A condition starts with `=` instead of a field name.
    #[error("empty field name")]
    EmptyFieldName,
    /// Two `&` in a row, or a leading/trailing `&`, or empty input.
    #[error("empty condition")]
    EmptyCondition,
    /// A field has no value (`field=` followed by `&` or end of input).
    #[error("empty value")]
    EmptyValue,
    /// A quoted string was not closed before end of input.
    #[error("unterminated quoted string")]
    UnterminatedString,
    /// A backslash escape other than `\"` or `\\`.
    #[error("invalid escape sequence")]
    InvalidEscape,
    /// A set closed without any members, e.g. `any()`.
    #[error("empty set member list")]
    EmptySetMembers,
    /// A character that is not valid in the current position.
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    /// Input ended in the middle of a construct.
    #[error("unexpected end of input")]
    UnexpectedEnd,
}

/// A parse failure, annotated with the position of the offending character
/// (or of end-of-input, one column past the last character).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} at line {line}, column {column}")]
pub struct ParseError {
    /// 1-based line of the error.
    pub line: u32,
    /// 1-based column of the error.
    pub column: u32,
    /// The error category.
    pub kind: ParseErrorKind,
}

// ─── State machine ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before a field name (start of input or just after `&`).
    FieldStart,
    /// Inside a field name.
    Field,
    /// After a field name, expecting `=`.
    BeforeEquals,
    /// After `=`, expecting a value.
    ValueStart,
    /// Inside a bare value (may still turn out to be a set name).
    BareValue,
    /// Inside a quoted scalar value.
    QuotedValue,
    /// After `\` inside a quoted scalar value.
    QuotedValueEscape,
    /// A condition is complete; expecting `&` or end of input.
    AfterValue,
    /// After `(` or `,` inside a set, expecting a member.
    MemberStart,
    /// Inside a bare set member.
    BareMember,
    /// Inside a quoted set member.
    QuotedMember,
    /// After `\` inside a quoted set member.
    QuotedMemberEscape,
    /// After a set member, expecting `,` or `)`.
    AfterMember,
}

fn is_field_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_value_char(c: char) -> bool {
    is_field_char(c) || c == '.' || c == '#' || c == '-'
}

struct Parser {
    state: State,
    line: u32,
    column: u32,
    field: String,
    buffer: String,
    set_name: String,
    members: Vec<String>,
    conditions: Vec<Condition>,
}

impl Parser {
    fn new() -> Self {
        Parser {
            state: State::FieldStart,
            line: 1,
            column: 1,
            field: String::new(),
            buffer: String::new(),
            set_name: String::new(),
            members: Vec::new(),
            conditions: Vec::new(),
        }
    }

    fn fail(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            line: self.line,
            column: self.column,
            kind,
        }
    }

    fn push_scalar(&mut self) {
        self.conditions.push(Condition {
            field: std::mem::take(&mut self.field),
            value: ConditionValue::Scalar(std::mem::take(&mut self.buffer)),
        });
    }

    fn push_set(&mut self) {
        self.conditions.push(Condition {
            field: std::mem::take(&mut self.field),
            value: ConditionValue::Set {
                name: std::mem::take(&mut self.set_name),
                members: std::mem::take(&mut self.members),
            },
        });
    }

    fn push_member(&mut self) {
        self.members.push(std::mem::take(&mut self.buffer));
    }

    fn step(&mut self, c: char) -> Result<(), ParseError> {
        match self.state {
            State::FieldStart => match c {
                _ if c.is_whitespace() => {}
                '&' => return Err(self.fail(ParseErrorKind::EmptyCondition)),
                '=' => return Err(self.fail(ParseErrorKind::EmptyFieldName)),
                _ if is_field_char(c) => {
                    self.field.push(c.to_ascii_lowercase());
                    self.state = State::Field;
                }
                _ => return Err(self.fail(ParseErrorKind::UnexpectedChar(c))),
            },

            State::Field => match c {
                _ if is_field_char(c) => self.field.push(c.to_ascii_lowercase()),
                '=' => self.state = State::ValueStart,
                _ if c.is_whitespace() => self.state = State::BeforeEquals,
                _ => return Err(self.fail(ParseErrorKind::UnexpectedChar(c))),
            },

            State::BeforeEquals => match c {
                _ if c.is_whitespace() => {}
                '=' => self.state = State::ValueStart,
                _ => return Err(self.fail(ParseErrorKind::UnexpectedChar(c))),
            },

            State::ValueStart => match c {
                _ if c.is_whitespace() => {}
                '"' => self.state = State::QuotedValue,
                '&' => return Err(self.fail(ParseErrorKind::EmptyValue)),
                _ if is_value_char(c) => {
                    self.buffer.push(c.to_ascii_lowercase());
                    self.state = State::BareValue;
                }
                _ => return Err(self.fail(ParseErrorKind::UnexpectedChar(c))),
            },

            State::BareValue => match c {
                _ if is_value_char(c) => self.buffer.push(c.to_ascii_lowercase()),
                '(' => {
                    self.set_name = std::mem::take(&mut self.buffer);
                    self.state = State::MemberStart;
                }
                '&' => {
                    self.push_scalar();
                    self.state = State::FieldStart;
                }
                _ if c.is_whitespace() => {
                    self.push_scalar();
                    self.state = State::AfterValue;
                }
                _ => return Err(self.fail(ParseErrorKind::UnexpectedChar(c))),
            },

            State::QuotedValue => match c {
                '"' => {
                    self.push_scalar();
                    self.state = State::AfterValue;
                }
                '\\' => self.state = State::QuotedValueEscape,
                _ => self.buffer.push(c),
            },

            State::QuotedValueEscape => match c {
                '"' | '\\' => {
                    self.buffer.push(c);
                    self.state = State::QuotedValue;
                }
                _ => return Err(self.fail(ParseErrorKind::InvalidEscape)),
            },

            State::AfterValue => match c {
                _ if c.is_whitespace() => {}
                '&' => self.state = State::FieldStart,
                _ => return Err(self.fail(ParseErrorKind::UnexpectedChar(c))),
            },

            State::MemberStart => match c {
                _ if c.is_whitespace() => {}
                '"' => self.state = State::QuotedMember,
                ')' => {
                    return Err(self.fail(if self.members.is_empty() {
                        ParseErrorKind::EmptySetMembers
                    } else {
                        ParseErrorKind::UnexpectedChar(')')
                    }));
                }
                _ if is_value_char(c) => {
                    self.buffer.push(c.to_ascii_lowercase());
                    self.state = State::BareMember;
                }
                _ => return Err(self.fail(ParseErrorKind::UnexpectedChar(c))),
            },

            State::BareMember => match c {
                _ if is_value_char(c) => self.buffer.push(c.to_ascii_lowercase()),
                ',' => {
                    self.push_member();
                    self.state = State::MemberStart;
                }
                ')' => {
                    self.push_member();
                    self.push_set();
                    self.state = State::AfterValue;
                }
                _ if c.is_whitespace() => {
                    self.push_member();
                    self.state = State::AfterMember;
                }
                _ => return Err(self.fail(ParseErrorKind::UnexpectedChar(c))),
            },

            State::QuotedMember => match c {
                '"' => {
                    self.push_member();
                    self.state = State::AfterMember;
                }
                '\\' => self.state = State::QuotedMemberEscape,
                _ => self.buffer.push(c),
            },

            State::QuotedMemberEscape => match c {
                '"' | '\\' => {
                    self.buffer.push(c);
                    self.state = State::QuotedMember;
                }
                _ => return Err(self.fail(ParseErrorKind::InvalidEscape)),
            },

            State::AfterMember => match c {
                _ if c.is_whitespace() => {}
                ',' => self.state = State::MemberStart,
                ')' => {
                    self.push_set();
                    self.state = State::AfterValue;
                }
                _ => return Err(self.fail(ParseErrorKind::UnexpectedChar(c))),
            },
        }
        Ok(())
    }

    fn advance(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    fn finish(mut self) -> Result<Vec<Condition>, ParseError> {
        match self.state {
            State::FieldStart => Err(self.fail(ParseErrorKind::EmptyCondition)),
            State::Field | State::BeforeEquals => Err(self.fail(ParseErrorKind::UnexpectedEnd)),
            State::ValueStart => Err(self.fail(ParseErrorKind::EmptyValue)),
            State::BareValue => {
                self.push_scalar();
                Ok(self.conditions)
            }
            State::QuotedValue
            | State::QuotedValueEscape
            | State::QuotedMember
            | State::QuotedMemberEscape => Err(self.fail(ParseErrorKind::UnterminatedString)),
            State::AfterValue => Ok(self.conditions),
            State::MemberStart | State::BareMember | State::AfterMember => {
                Err(self.fail(ParseErrorKind::UnexpectedEnd))
            }
        }
    }
}

/// Parses filter text into its list of conditions.
///
/// Duplicate field names are accepted here; rejecting them is the
/// compiler's responsibility.
pub fn parse(text: &str) -> Result<Vec<Condition>, ParseError> {
    let mut parser = Parser::new();
    for c in text.chars() {
        parser.step(c)?;
        parser.advance(c);
    }
    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(field: &str, value: &str) -> Condition {
        Condition {
            field: field.into(),
            value: ConditionValue::Scalar(value.into()),
        }
    }

    fn set(field: &str, name: &str, members: &[&str]) -> Condition {
        Condition {
            field: field.into(),
            value: ConditionValue::Set {
                name: name.into(),
                members: members.iter().map(|m| m.to_string()).collect(),
            },
        }
    }

    #[test]
    fn parses_single_scalar_condition() {
        assert_eq!(parse("type=1").unwrap(), vec![scalar("type", "1")]);
    }

    #[test]
    fn parses_set_condition() {
        assert_eq!(
            parse("type=any(1,2,3)").unwrap(),
            vec![set("type", "any", &["1", "2", "3"])]
        );
    }

    #[test]
    fn parses_conjunction_with_whitespace() {
        assert_eq!(
            parse(" type = 1 & room = any( chat.example.com#11 , chat.example.com#22 ) ").unwrap(),
            vec![
                scalar("type", "1"),
                set("room", "any", &["chat.example.com#11", "chat.example.com#22"]),
            ]
        );
    }

    #[test]
    fn duplicate_fields_are_left_to_the_compiler() {
        assert_eq!(
            parse("type=1 & type=2").unwrap(),
            vec![scalar("type", "1"), scalar("type", "2")]
        );
    }

    #[test]
    fn folds_case_of_fields_values_and_set_names() {
        assert_eq!(
            parse("TYPE=Any(1)").unwrap(),
            vec![set("type", "any", &["1"])]
        );
        assert_eq!(
            parse("Room=Chat.Example.COM#11").unwrap(),
            vec![scalar("room", "chat.example.com#11")]
        );
    }

    #[test]
    fn parses_quoted_values_with_escapes() {
        assert_eq!(
            parse(r#"class="user""#).unwrap(),
            vec![scalar("class", "user")]
        );
        assert_eq!(
            parse(r#"x="a\"b\\c""#).unwrap(),
            vec![scalar("x", r#"a"b\c"#)]
        );
        assert_eq!(
            parse(r#"type=any("1", "2")"#).unwrap(),
            vec![set("type", "any", &["1", "2"])]
        );
    }

    #[test]
    fn empty_condition_errors_with_position() {
        let err = parse("type=1&&room=x").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::EmptyCondition);
        assert_eq!((err.line, err.column), (1, 8));

        assert_eq!(
            parse("type=1&").unwrap_err().kind,
            ParseErrorKind::EmptyCondition
        );
        assert_eq!(parse("").unwrap_err().kind, ParseErrorKind::EmptyCondition);
        assert_eq!(parse("   ").unwrap_err().kind, ParseErrorKind::EmptyCondition);
    }

    #[test]
    fn empty_field_name_errors() {
        let err = parse("=1").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::EmptyFieldName);
        assert_eq!((err.line, err.column), (1, 1));
    }

    #[test]
    fn empty_value_errors() {
        assert_eq!(parse("type=").unwrap_err().kind, ParseErrorKind::EmptyValue);
        assert_eq!(
            parse("type=&room=x").unwrap_err().kind,
            ParseErrorKind::EmptyValue
        );
    }

    #[test]
    fn unterminated_string_errors() {
        assert_eq!(
            parse(r#"type="1"#).unwrap_err().kind,
            ParseErrorKind::UnterminatedString
        );
        assert_eq!(
            parse(r#"type=any("1"#).unwrap_err().kind,
            ParseErrorKind::UnterminatedString
        );
    }

    #[test]
    fn invalid_escape_errors() {
        assert_eq!(
            parse(r#"x="a\nb""#).unwrap_err().kind,
            ParseErrorKind::InvalidEscape
        );
    }

    #[test]
    fn empty_set_member_list_errors() {
        assert_eq!(
            parse("type=any()").unwrap_err().kind,
            ParseErrorKind::EmptySetMembers
        );
        // A trailing comma is not an empty set, just misplaced punctuation.
        assert_eq!(
            parse("type=any(1,)").unwrap_err().kind,
            ParseErrorKind::UnexpectedChar(')')
        );
    }

    #[test]
    fn trailing_garbage_after_value_errors() {
        let err = parse("type=1 2").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedChar('2'));
        assert_eq!((err.line, err.column), (1, 8));

        assert_eq!(
            parse("type=1)").unwrap_err().kind,
            ParseErrorKind::UnexpectedChar(')')
        );
    }

    #[test]
    fn dangling_constructs_error() {
        assert_eq!(parse("type").unwrap_err().kind, ParseErrorKind::UnexpectedEnd);
        assert_eq!(
            parse("type=any(1").unwrap_err().kind,
            ParseErrorKind::UnexpectedEnd
        );
        assert_eq!(
            parse("type!1").unwrap_err().kind,
            ParseErrorKind::UnexpectedChar('!')
        );
    }

    #[test]
    fn positions_track_lines() {
        let err = parse("type=1 &\n& room=x").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::EmptyCondition);
        assert_eq!((err.line, err.column), (2, 1));
    }
}
