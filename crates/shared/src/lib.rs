pub mod domain;
pub mod error;
pub mod path;
pub mod protocol;
pub mod snapshot;
