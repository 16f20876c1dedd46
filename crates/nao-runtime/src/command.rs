//! Typed form of the flat command grammar.
//!
//! | Tokens | Command |
//! |---|---|
//! | `point <"left"\|"right"> x y z` | [`Command::Point`] |
//! | `look x y z` | [`Command::Look`] |
//! | `hand <"left"\|"right"> <"open"\|"close">` | [`Command::Hand`] |
//! | `stiffness v` | [`Command::Stiffness`] |
//!
//! Any other leading token parses to [`Command::Unknown`].  Numbers may be
//! sent as integers or floats; strings are never coerced to numbers.

use nao_types::{CommandMessage, Limb, Token, Vector3};
use thiserror::Error;

/// A recognised command with its validated arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Point { limb: Limb, target: Vector3 },
    Look { target: Vector3 },
    Hand { limb: Limb, open: bool },
    Stiffness(f64),
    /// Empty message, non-string name, or a name nobody handles.
    Unknown,
}

/// Malformed arguments for a recognised command.  The display text is the
/// usage hint sent back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error(r#"message format for point: point <"left"|"right"> x y z"#)]
    Point,
    #[error("message format for look: look x y z")]
    Look,
    #[error(r#"message format for hand: hand <"left"|"right"> <"open"|"close">"#)]
    Hand,
    #[error("message format for stiffness: stiffness <value in [0, 1]>")]
    Stiffness,
}

impl Command {
    /// Parse a message.  Unrecognised names are not an error; they yield
    /// [`Command::Unknown`].
    pub fn parse(message: &CommandMessage) -> Result<Self, CommandError> {
        let tokens = message.tokens();
        match message.name() {
            Some("point") => match tokens {
                [_, Token::Str(limb), x, y, z] => {
                    let limb = Limb::from_command(limb).ok_or(CommandError::Point)?;
                    let target = vector(x, y, z).ok_or(CommandError::Point)?;
                    Ok(Command::Point { limb, target })
                }
                _ => Err(CommandError::Point),
            },
            Some("look") => match tokens {
                [_, x, y, z] => {
                    let target = vector(x, y, z).ok_or(CommandError::Look)?;
                    Ok(Command::Look { target })
                }
                _ => Err(CommandError::Look),
            },
            Some("hand") => match tokens {
                [_, Token::Str(limb), Token::Str(action)] => {
                    let limb = Limb::from_command(limb).ok_or(CommandError::Hand)?;
                    let open = match action.as_str() {
                        "open" => true,
                        "close" => false,
                        _ => return Err(CommandError::Hand),
                    };
                    Ok(Command::Hand { limb, open })
                }
                _ => Err(CommandError::Hand),
            },
            Some("stiffness") => match tokens {
                [_, value] => value
                    .as_f64()
                    .filter(|v| v.is_finite())
                    .map(Command::Stiffness)
                    .ok_or(CommandError::Stiffness),
                _ => Err(CommandError::Stiffness),
            },
            _ => Ok(Command::Unknown),
        }
    }

    /// Wire name of the command, `None` for [`Command::Unknown`].
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Command::Point { .. } => Some("point"),
            Command::Look { .. } => Some("look"),
            Command::Hand { .. } => Some("hand"),
            Command::Stiffness(_) => Some("stiffness"),
            Command::Unknown => None,
        }
    }
}

fn vector(x: &Token, y: &Token, z: &Token) -> Option<Vector3> {
    let v = Vector3::new(x.as_f64()?, y.as_f64()?, z.as_f64()?);
    (v.x.is_finite() && v.y.is_finite() && v.z.is_finite()).then_some(v)
}
