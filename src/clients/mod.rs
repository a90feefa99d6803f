//! Clients - HTTP Clients for External APIs
//!
//! This module contains the telematics provider client and the pagination
//! loop used by the sync cycle.

pub mod pagination;
pub mod telematics_client;

pub use pagination::{fetch_all_pages, PageOptions, PageStop, PagedRecords};
pub use telematics_client::{TelematicsApi, TelematicsClient};
