//! Huckleberry - Schema-compiled binary serialization library for Rust
//!
//! A schema is a JSON type description. Compiling it yields an immutable
//! [`Codec`] that converts between the canonical [`Value`] representation and
//! the length-prefixed binary wire encoding. Compile once, then encode and
//! decode from as many threads as you like.
//!
//! # Example
//!
//! ```rust
//! use huckleberry::{Codec, Result, Value};
//!
//! fn main() -> Result<()> {
//!     let codec = Codec::new(
//!         r#"{"type":"record","name":"Point","fields":[
//!             {"name":"x","type":"long"},
//!             {"name":"y","type":"long"}
//!         ]}"#,
//!     )?;
//!
//!     // Encoding
//!     let datum = Value::record([("x", 3i64), ("y", -1i64)]);
//!     let data = codec.encode(&datum)?;
//!     assert_eq!(data, vec![0x06, 0x01]);
//!
//!     // Decoding
//!     let (decoded, remaining) = codec.decode(&data)?;
//!     assert!(remaining.is_empty());
//!     assert_eq!(decoded, datum);
//!     Ok(())
//! }
//! ```

mod codec;
mod error;
mod reader;
mod schema;
mod value;
pub mod wire;
mod writer;

pub use codec::Codec;
pub use error::{Error, Result};
pub use reader::Reader;
pub use value::Value;
pub use wire::{MAX_BLOCK_COUNT, MAX_BLOCK_SIZE};
pub use writer::Writer;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
