//! Configuration parsing
//!
//! Handles parsing of the service configuration file.
//!
//! ## Configuration Format
//!
//! ```yaml
//! server:
//!   name: stategate
//!   port: 6363
//!   busy_threshold: 2s
//!
//! evaluator:
//!   upstream_url: http://evaluator:6363
//!   timeout: 10m
//!
//! processes:
//!   allow: []
//!   restrict:
//!     - some-blocked-process-id
//! ```

mod service;

pub use service::{
    Config, ConfigError, DEFAULT_BUSY_THRESHOLD, DEFAULT_PORT, EvaluatorConfig,
    ProcessListConfig, ServerConfig,
};
