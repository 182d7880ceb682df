//! Backend API access for the HubX admin console
//!
//! Wraps every outbound REST call in the authenticated request pipeline:
//! bearer injection from the current session and a single reactive
//! refresh-and-retry when the backend answers 401. The session itself is
//! owned by the `hubx-auth` crate; this one only reads it (and asks it to
//! refresh).

pub mod admin;
pub mod client;
pub mod error;

pub use admin::AdminApi;
pub use client::{ApiClient, ApiClientConfig};
pub use error::ApiError;
