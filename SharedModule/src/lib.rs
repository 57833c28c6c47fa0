//! # Bridge SharedModule
//!
//! Types both sides of the object bridge agree on: object ids, the value
//! model carried in command arguments, the command envelope and the compact
//! msgpack wire codec. The declarative runtime (`nbridge_client`) and any
//! Rust-side native peer depend on this crate so the two ends of the wire can
//! never drift apart.

// Export module structure
pub mod constants;
pub mod object;
pub mod types;
pub mod command;
pub mod codec;
pub mod error;

// Re-export commonly used items for convenience
pub use object::{ObjectId, RemoteObject};
pub use types::{Arg, Value};
pub use command::{Command, CommandKind};
pub use codec::{decode_batch, decode_batch_lenient, encode_batch};
pub use error::{RemoteError, WireError};
