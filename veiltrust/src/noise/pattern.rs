// Handshake pattern descriptors. A pattern is data: the executor in
// `state.rs` interprets the token lists, so XX, IK and the XX-fallback
// replay all run through the same engine.

use std::fmt;

use super::{PROTOCOL_NAME_IK, PROTOCOL_NAME_XX};

/// A single Noise handshake token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    E,
    S,
    EE,
    ES,
    SE,
    SS,
}

impl Token {
    pub fn is_dh(self) -> bool {
        matches!(self, Token::EE | Token::ES | Token::SE | Token::SS)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::E => "e",
            Token::S => "s",
            Token::EE => "ee",
            Token::ES => "es",
            Token::SE => "se",
            Token::SS => "ss",
        };
        f.write_str(s)
    }
}

/// One message of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagePattern {
    pub tokens: &'static [Token],
    /// Whether the sender's signed identity payload rides in this message.
    pub carries_identity: bool,
}

impl MessagePattern {
    pub fn has_ephemeral(&self) -> bool {
        self.tokens.contains(&Token::E)
    }
}

/// A handshake pattern. Messages alternate starting with the initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    pub name: &'static str,
    pub protocol_name: &'static str,
    /// `<- s` pre-message: the initiator knows the responder's static key.
    pub responder_static_premessage: bool,
    pub messages: &'static [MessagePattern],
}

/// ```text
/// XX:
///   -> e
///   <- e, ee, s, es
///   -> s, se
/// ```
pub const XX: Pattern = Pattern {
    name: "XX",
    protocol_name: PROTOCOL_NAME_XX,
    responder_static_premessage: false,
    messages: &[
        MessagePattern {
            tokens: &[Token::E],
            carries_identity: false,
        },
        MessagePattern {
            tokens: &[Token::E, Token::EE, Token::S, Token::ES],
            carries_identity: true,
        },
        MessagePattern {
            tokens: &[Token::S, Token::SE],
            carries_identity: true,
        },
    ],
};

/// ```text
/// IK:
///   <- s
///   ...
///   -> e, es, s, ss
///   <- e, ee, se
/// ```
pub const IK: Pattern = Pattern {
    name: "IK",
    protocol_name: PROTOCOL_NAME_IK,
    responder_static_premessage: true,
    messages: &[
        MessagePattern {
            tokens: &[Token::E, Token::ES, Token::S, Token::SS],
            carries_identity: true,
        },
        MessagePattern {
            tokens: &[Token::E, Token::EE, Token::SE],
            carries_identity: true,
        },
    ],
};

impl Pattern {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The message at `index`, if the pattern has one.
    pub fn message(&self, index: usize) -> Option<&'static MessagePattern> {
        self.messages.get(index)
    }

    /// Render as `e, ee, s, es` for a given message.
    pub fn describe(&self, index: usize) -> String {
        self.message(index)
            .map(|m| {
                m.tokens
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xx_layout() {
        assert_eq!(XX.len(), 3);
        assert_eq!(XX.describe(1), "e, ee, s, es");
        assert!(XX.messages[0].has_ephemeral());
        assert!(!XX.messages[2].has_ephemeral());
        assert!(!XX.messages[0].carries_identity);
    }

    #[test]
    fn ik_includes_ss() {
        assert_eq!(IK.len(), 2);
        assert!(IK.responder_static_premessage);
        assert_eq!(IK.describe(0), "e, es, s, ss");
        assert_eq!(IK.describe(1), "e, ee, se");
        assert!(IK.messages.iter().all(|m| m.carries_identity));
    }

    #[test]
    fn describe_out_of_range_is_empty() {
        assert_eq!(XX.describe(9), "");
    }
}
