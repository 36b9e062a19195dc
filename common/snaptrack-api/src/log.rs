//! A global, configurable level filter.
//!
//! The binary sets the level if the --log <level> option is provided.
//! get_level() returns None unless set_level has been called.
use std::{
    str::FromStr,
    sync::atomic::{AtomicU8, Ordering},
};

use log::LevelFilter;

// unset
static LOG_LEVEL: AtomicU8 = AtomicU8::new(0);

pub fn set_level(level: LevelFilter) {
    LOG_LEVEL.store(discriminant_of(level), Ordering::SeqCst);
}

pub fn get_level() -> Option<LevelFilter> {
    level_of(LOG_LEVEL.load(Ordering::SeqCst))
}

/// Parses and sets the level.  Unrecognized names leave the level untouched.
pub fn set_level_str(level: &str) -> bool {
    match LevelFilter::from_str(level) {
        Ok(filter) => {
            set_level(filter);
            true
        }
        Err(_) => false,
    }
}

// LevelFilter::from_usize is private, so the cases are repeated here with 0 as unset
fn discriminant_of(filter: LevelFilter) -> u8 {
    match filter {
        LevelFilter::Trace => 1,
        LevelFilter::Debug => 2,
        LevelFilter::Info => 3,
        LevelFilter::Warn => 4,
        LevelFilter::Error => 5,
        LevelFilter::Off => 6,
    }
}

fn level_of(filter: u8) -> Option<LevelFilter> {
    match filter {
        1 => Some(LevelFilter::Trace),
        2 => Some(LevelFilter::Debug),
        3 => Some(LevelFilter::Info),
        4 => Some(LevelFilter::Warn),
        5 => Some(LevelFilter::Error),
        6 => Some(LevelFilter::Off),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{discriminant_of, level_of};
    use log::LevelFilter;

    #[test]
    fn discriminants_are_reversible() {
        for level in LevelFilter::iter() {
            assert_eq!(Some(level), level_of(discriminant_of(level)));
        }
    }

    #[test]
    fn zero_is_unset() {
        assert_eq!(None, level_of(0));
    }
}
