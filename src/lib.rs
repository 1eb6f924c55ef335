//! A client for the National Vulnerability Database CVE API.
//!
//! It looks up single CVEs, pages of CVEs, and can download the whole
//! collection into an in-memory [`models::Snapshot`] while respecting the NVD
//! rate limits.

pub mod application;
pub mod cancel;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod nvd;
pub mod retry;
pub mod writers;
