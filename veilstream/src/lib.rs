//! VeilStream: Noise secure channels over any async duplex byte stream.
//!
//! [`Noise`] runs the XX, IK or XX-fallback handshake over a
//! length-prefixed framing of the caller's stream and returns a
//! [`SecureStream`] implementing `AsyncRead + AsyncWrite`. The handshake
//! engine itself lives in `veiltrust` and performs no I/O.

pub mod config;
pub mod error;
pub mod key_cache;
pub mod metrics;
pub mod session;
pub mod stream;

pub use config::NoiseConfig;
pub use error::{Result, VeilStreamError};
pub use key_cache::{MemoryKeyCache, StaticKeyCache};
pub use metrics::{MetricsSnapshot, NoiseMetrics};
pub use session::{Noise, SecuredConnection, PROTOCOL_ID};
pub use stream::SecureStream;
pub use veiltrust::{IdentityKeyPair, PatternKind, PeerId};
