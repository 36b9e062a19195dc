mod carrier;
mod connection;

pub use carrier::*;
pub use connection::*;
