pub use crate::bus::ChannelBus;
pub use anyhow::Context;
pub use lifeline::{dyn_bus::DynBus, Bus, CarryFrom, Lifeline, Service, Task};
pub use log::{debug, error, info, trace};
