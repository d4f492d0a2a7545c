//! CatLink cloud client
//!
//! [`CloudClient`] is the seam between the coordinator and the vendor
//! cloud. [`HttpCloudClient`] talks to the regional REST endpoints with a
//! 30 second timeout; tests substitute scripted implementations.

mod client;
pub mod endpoints;
mod error;
mod types;

pub use client::{CloudClient, HttpCloudClient};
pub use error::{ClientError, ClientResult};
pub use types::{
    check_session, check_success, return_code, CommandAck, RawDevice, Session, TOKEN_ERROR_CODES,
};
