pub mod client;
pub mod parse;
pub mod retry;
pub mod transport;

// Re-export the pieces the rest of the server wires together
pub use client::{PriceApiClient, PriceSource};
pub use retry::RetryPolicy;
pub use transport::ReqwestTransport;
