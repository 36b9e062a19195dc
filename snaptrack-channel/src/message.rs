pub mod inbound;
pub mod notification;
