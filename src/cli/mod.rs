//! # CLI Module
//!
//! Command-line interface for the `routegate` binary. It wires the built-in
//! `echo` demo resource into a [`crate::dispatcher::Dispatcher`] and lets you
//! push single requests through it.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! Print the routing table, one `METHOD pattern` line per route:
//!
//! ```bash
//! routegate routes
//! ```
//!
//! ### `request`
//!
//! Dispatch one request through the full pipeline (rate limit, routing,
//! payload checks, handler, rendering) and write the HTTP response to stdout:
//!
//! ```bash
//! routegate request GET '/user/bob?verbose=1' -H 'Accept-Encoding: gzip'
//! routegate request PUT /blob --body hello
//! routegate --static-root ./public request GET /files/index.html
//! ```
//!
//! ### `config`
//!
//! Print the effective configuration as TOML:
//!
//! ```bash
//! ROUTEGATE_RATE_LIMIT=100 routegate config
//! ```

mod commands;


pub use commands::{build_dispatcher, run, run_cli, Cli, Commands};
