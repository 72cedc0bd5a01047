//! MaxDB Thin Client for Rust
//!
//! A pure Rust implementation of the MaxDB order interface that talks to the
//! database kernel over TCP, without the MaxDB runtime libraries.
//!
//! # Example
//!
//! ```no_run
//! use maxdb_thin_rs::{Connection, MaxDbValue, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Connect to the database
//!     let mut conn = Connection::connect(
//!         "Server=localhost;Database=MAXDB;User Id=DBA;Password=secret;Cache=all"
//!     ).await?;
//!
//!     if let Some(version) = conn.kernel_version() {
//!         println!("Connected to MaxDB kernel {}", version);
//!     }
//!
//!     let result = conn.query("SELECT * FROM DUAL", &[]).await?;
//!     for row in &result {
//!         println!("{:?}", row.get(0).map(MaxDbValue::to_string));
//!     }
//!
//!     // Close connection
//!     conn.close().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod error;
pub mod pool;
pub mod protocol;

// Re-export main types
pub use connection::{CancelHandle, Connection, ExecuteResult, QueryResult};
pub use error::{Error, Result};
pub use pool::{
    ConnectionPool, Connector, MaxDbConnector, PoolConfig, PoolStatus, PooledSession, Session,
};
pub use protocol::connect::ConnectParams;
pub use protocol::parse_info::{CacheStats, ParseInfo, ParseInfoCache};
pub use protocol::types::{DataType, FieldInfo, LongValue, MaxDbValue, Row};
