//! Everything that talks to the mapi binary: request types, command lines and
//! process execution.

pub mod command;
pub mod request;
pub mod rules;
pub mod runner;

pub use command::{CommandBuilder, Invocation};
pub use request::{DefectListRequest, DiscoverRequest, RunRequest, ValidationError};
pub use runner::{ProcessRunner, RunnerError};
