//! HTTP API: job submission, status lookup and dev credential exposure.

pub mod app;
