//! # Tyne
//! A bidirectional Model Context Protocol engine for Rust
//!
//! ## Dependencies
//! ```toml
//! [dependencies]
//! tyne = "0.1.0"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ## Example
//! ```no_run
//! use tyne::{Engine, Side, transport::pipe::Pipe};
//! use tyne::error::Error;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let (local, remote) = Pipe::new();
//!
//!     let server = Engine::new(Side::Server);
//!     server.map_handler("echo", |req: tyne::types::Request| async move {
//!         req.params.unwrap_or_default()
//!     });
//!     server.connect(remote)?;
//!
//!     let client = Engine::new(Side::Client);
//!     client.connect(local)?;
//!     client.initialize().await?;
//!     client.ping().await?;
//!     client.close().await
//! }
//! ```

pub use engine::{Engine, Side};

pub mod engine;
pub mod error;
pub mod shared;
pub mod tasks;
pub mod transport;
pub mod types;

pub(crate) const SDK_NAME: &str = "tyne";
pub(crate) const PROTOCOL_VERSIONS: [&str; 2] = [
    "2025-03-26",
    "2025-11-25"
];
