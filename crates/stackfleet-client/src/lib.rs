//! stackfleet-client: HTTP client for the service registry
//!
//! ```no_run
//! use std::time::Duration;
//! use stackfleet_client::RegistryClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RegistryClient::with_timeout("http://core-db:8090", Duration::from_secs(5))?;
//! let snapshot = client.fetch_snapshot().await?;
//! for service in &snapshot.services {
//!     println!("{} {}", service.name, service.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod http;

pub use error::{ClientError, Result};
pub use http::RegistryClient;
