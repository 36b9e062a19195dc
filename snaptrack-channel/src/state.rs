pub mod connection;
pub mod snapshot;
