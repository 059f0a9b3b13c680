// Handshake executors: XX, IK and XX-fallback with identity binding.

pub mod messages;
pub mod protocol;
pub mod state;

pub use messages::{MessageBuffer, MessageLayout};
pub use protocol::{Handshake, HandshakeConfig};
pub use state::PatternKind;
