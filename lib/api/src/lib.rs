//! HTTP interface to the idmatch engine
//!
//! - `GET /health`
//! - `POST /compare` with `{record1, record2}`
//! - `POST /compare/batch` with `{pairs: [{record1, record2}, ...]}`

pub mod rest;

pub use rest::{configure, CompareRequest, RestApi};
