//! Environment overrides for the config file.
use log::debug;

/// Overrides the websocket endpoint in the config file.
pub const ENDPOINT_VAR: &str = "SNAPTRACK_ENDPOINT";

/// Overrides the bearer token in the config file.
pub const TOKEN_VAR: &str = "SNAPTRACK_TOKEN";

pub fn endpoint() -> Option<String> {
    non_empty_var(ENDPOINT_VAR)
}

pub fn auth_token() -> Option<String> {
    non_empty_var(TOKEN_VAR)
}

fn non_empty_var(var: &str) -> Option<String> {
    let value = std::env::var(var).ok().filter(|value| !value.trim().is_empty())?;
    debug!("using {} from the environment", var);
    Some(value)
}
