//! Client for the external CRUD services.
//!
//! [`CrudClient`] implements the saga's [`saga::StepExecutor`] and
//! [`saga::Compensator`] seams over HTTP:
//!
//! | Operation | Request                        |
//! |-----------|--------------------------------|
//! | create    | `POST {base}/create` + payload |
//! | update    | `PUT {base}/{id}` + payload    |
//! | delete    | `DELETE {base}/{id}`           |
//! | undo      | `DELETE {base}/{id}`           |
//!
//! In mock mode no request is sent and identifiers are fabricated.

pub mod client;
pub mod config;
pub mod response;

pub use client::CrudClient;
pub use config::ClientConfig;
pub use response::extract_resource_id;
