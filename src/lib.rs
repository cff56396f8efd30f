pub mod cache;
pub mod cli;
pub mod clients;
pub mod config;
pub mod digest;
pub mod download;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod humanize;
pub mod materialize;
pub mod observability;
pub mod pull;
pub mod reference;
pub mod request;
pub mod trust;

pub use error::{PullError, Result};
pub use pull::{PullOutcome, Puller};
pub use request::PullRequest;
