//! Configuration gateway
//!
//! Turns profile/property operations into requests against the configuration
//! service and reports every failure on the notification bus.
//!
//! Architecture follows the project pattern (trait + impl + mock):
//! - `Transport` trait: async seam between the gateway and the network
//! - `HttpTransport`: real implementation using reqwest
//! - `MockConfigService`: in-memory service for tests and offline runs
//! - `ConfigGateway`: the domain operations, each returning an `Outcome`

pub mod client;
pub mod http;
pub mod mock;
pub mod models;
pub mod outcome;
pub mod transport;

pub use client::{ConfigGateway, FAILURE_TITLE};
pub use http::HttpTransport;
pub use mock::MockConfigService;
pub use models::{Profile, ProfileId, Property, PropertyBinding, PropertyDetails, PropertyId};
pub use outcome::{Failure, Outcome};
pub use transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
