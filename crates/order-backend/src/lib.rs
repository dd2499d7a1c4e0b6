//! Order-management backend client (C1, §4.1): token refresh, phone/order
//! search, return write-back. The only shared, process-wide dependency in
//! the bridge — one client instance serves every call, guarding its access
//! token behind a single-flight mutex (§5).

mod client;
mod normalize;
mod token;

pub use client::{OrderBackendClient, RegisterReturnRequest, RegisterReturnResponse, SearchQuery};
pub use normalize::normalize_phone;
