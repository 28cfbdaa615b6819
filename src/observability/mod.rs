//! Observability: structured access logging

pub mod access_log;
