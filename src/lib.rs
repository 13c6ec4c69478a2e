// Library root
// -----------
// Client bindings for the doarama.com GPS track visualisation API, plus
// the command surface for the `doarama` binary.
//
// Module responsibilities:
// - `client`: the blocking HTTP client, per-user sessions and every
//   remote operation (activities, visualisations, activity types).
// - `models`: resource types mirrored from the API and the purely local
//   visualisation URL rendering.
// - `config`: process-wide configuration resolved once at startup.
// - `error`: the library error type; every remote failure names the
//   operation it came from.
// - `cli`: argument parsing and command dispatch for the binary.
//
// Keeping the client separate from the CLI means the bindings can be
// used as a library without pulling in any terminal concerns.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod models;

pub use client::{CancelToken, Client, RetryPolicy, Session, SingleAttempt};
pub use config::{Config, DEFAULT_API_URL};
pub use error::{Error, Result};
pub use models::{Activity, ActivityInfo, ActivityType, Visualisation, VisualisationUrlOptions};
