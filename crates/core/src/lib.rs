#![forbid(unsafe_code)]

pub mod error;
pub mod gate;
pub mod grader;
pub mod model;
pub mod remediation;
pub mod time;

pub use error::Error;
pub use time::Clock;
