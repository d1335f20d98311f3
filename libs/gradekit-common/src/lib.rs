pub mod config;
pub mod error;
pub mod submission;
pub mod time;
pub mod types;

pub use error::CommonError;
