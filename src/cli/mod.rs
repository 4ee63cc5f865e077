//! Command line surface of the `snapback` binary

pub mod args;
pub mod output;
