//! Flat token messages carried over the RPC transport.
//!
//! On the wire a message is a JSON array whose elements are strings, integers
//! or floats, e.g. `["point", "left", 0.2, 0.0, 0.1]`.  Readers pick tokens by
//! position and expected type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Positive acknowledgement token.
pub const ACK: &str = "ack";
/// Negative acknowledgement token.
pub const NACK: &str = "nack";

/// A single typed token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    Int(i64),
    Double(f64),
    Str(String),
}

impl Token {
    /// Numeric value of the token; strings are not coerced.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Token::Int(i) => Some(*i as f64),
            Token::Double(d) => Some(*d),
            Token::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Token::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::Str(s.to_string())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::Str(s)
    }
}

impl From<f64> for Token {
    fn from(v: f64) -> Self {
        Token::Double(v)
    }
}

impl From<i64> for Token {
    fn from(v: i64) -> Self {
        Token::Int(v)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(i) => write!(f, "{i}"),
            Token::Double(d) => write!(f, "{d}"),
            Token::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

fn write_tokens(f: &mut fmt::Formatter<'_>, tokens: &[Token]) -> fmt::Result {
    for (i, t) in tokens.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{t}")?;
    }
    Ok(())
}

/// An inbound command.  Token 0 is the command name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandMessage(Vec<Token>);

impl CommandMessage {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.0.get(index)
    }

    /// Command name, if token 0 is a string.
    pub fn name(&self) -> Option<&str> {
        self.get(0).and_then(Token::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }
}

impl From<Vec<Token>> for CommandMessage {
    fn from(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }
}

impl fmt::Display for CommandMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tokens(f, &self.0)
    }
}

/// An outbound reply.  Token 0 is `"ack"` or `"nack"`; a `nack` may carry a
/// trailing usage hint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplyMessage(Vec<Token>);

impl ReplyMessage {
    pub fn ack() -> Self {
        Self(vec![Token::from(ACK)])
    }

    pub fn nack() -> Self {
        Self(vec![Token::from(NACK)])
    }

    /// `nack` followed by a human-readable hint.
    pub fn nack_with(hint: impl Into<String>) -> Self {
        Self(vec![Token::from(NACK), Token::Str(hint.into())])
    }

    pub fn is_ack(&self) -> bool {
        self.0.first().and_then(Token::as_str) == Some(ACK)
    }

    pub fn is_nack(&self) -> bool {
        self.0.first().and_then(Token::as_str) == Some(NACK)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }
}

impl fmt::Display for ReplyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tokens(f, &self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_parses_mixed_json_tokens() {
        let cmd: CommandMessage =
            serde_json::from_str(r#"["point", "left", 0.2, 0, -1.5]"#).unwrap();
        assert_eq!(cmd.name(), Some("point"));
        assert_eq!(cmd.len(), 5);
        assert_eq!(cmd.get(1).and_then(Token::as_str), Some("left"));
        assert_eq!(cmd.get(2).and_then(Token::as_f64), Some(0.2));
        assert_eq!(cmd.get(3), Some(&Token::Int(0)));
        assert_eq!(cmd.get(3).and_then(Token::as_f64), Some(0.0));
        assert!(cmd.get(5).is_none());
    }

    #[test]
    fn strings_are_not_numbers() {
        assert_eq!(Token::from("0.5").as_f64(), None);
        assert_eq!(Token::from(3i64).as_str(), None);
    }

    #[test]
    fn reply_serialises_as_flat_array() {
        assert_eq!(serde_json::to_string(&ReplyMessage::ack()).unwrap(), r#"["ack"]"#);
        let nack = ReplyMessage::nack_with("usage");
        assert_eq!(serde_json::to_string(&nack).unwrap(), r#"["nack","usage"]"#);
        assert!(nack.is_nack());
        assert!(!nack.is_ack());
    }

    #[test]
    fn display_joins_tokens() {
        let cmd = CommandMessage::new(vec!["look".into(), 1i64.into(), 0.5.into()]);
        assert_eq!(cmd.to_string(), r#""look" 1 0.5"#);
    }

    #[test]
    fn empty_command_has_no_name() {
        let cmd = CommandMessage::default();
        assert!(cmd.is_empty());
        assert!(cmd.name().is_none());
    }
}
