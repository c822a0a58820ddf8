//! HTTP client for the dashboard REST API.
//!
//! Used to fetch a resource's current document before pinning it.
//!
//! # Example
//!
//! ```rust,ignore
//! use crossview_sdk::client::{ResourceClient, ClientConfig};
//! use crossview_sdk::ResourceRef;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ResourceClient::with_base_url("http://localhost:3001")?;
//!
//!     let reference = ResourceRef::parse("v1/ConfigMap/default/settings")
//!         .ok_or("bad reference")?;
//!     let document = client.get_resource(&reference, Some("kind-dev")).await?;
//!     println!("{}", document["metadata"]["resourceVersion"]);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;

pub use config::ClientConfig;
pub use error::ClientError;
pub use http::ResourceClient;
