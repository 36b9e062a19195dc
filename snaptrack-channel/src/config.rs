use lifeline::impl_storage_clone;
use snaptrack_api::config::{Config, DEFAULT_ENDPOINT, DEFAULT_ORIGIN};
use typed_builder::TypedBuilder;

/// Connection settings for a channel scope.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct ChannelConfig {
    #[builder(default = DEFAULT_ENDPOINT.to_string(), setter(into))]
    pub endpoint: String,

    /// Sent as the Origin header.  The agent rejects any other origin.
    #[builder(default = DEFAULT_ORIGIN.to_string(), setter(into))]
    pub origin: String,

    #[builder(default, setter(strip_option, into))]
    pub auth_token: Option<String>,
}

impl_storage_clone!(ChannelConfig);

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&Config> for ChannelConfig {
    fn from(config: &Config) -> Self {
        ChannelConfig {
            endpoint: config.endpoint.clone(),
            origin: config.origin.clone(),
            auth_token: config.auth_token.clone(),
        }
    }
}
