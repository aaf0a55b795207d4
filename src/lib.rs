pub mod cast;
pub mod client;
pub mod error;
pub mod global;
pub mod lexer;
pub mod parser;
pub mod source;
pub mod store;
pub mod transport;
pub mod tree;
pub mod utils;
mod serialization;

pub use client::{ClientConfig, ParamClient};
pub use error::{LexError, ParamError, ParserError};
pub use parser::{parse_bytes, parse_file, parse_str, ParseOptions};
pub use serialization::Value;
pub use store::{ParamStore, UpdateOutcome};
pub use transport::{MemoryTransport, ParamRequest, ParamUpdate, Transport};
pub use tree::{Element, ElementKind, Tree};
