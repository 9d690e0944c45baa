pub(crate) mod auth;
pub(crate) mod core;
pub(crate) mod domain;
pub(crate) mod errors;
pub(crate) mod files;
pub(crate) mod handlers;
pub(crate) mod metrics;
pub(crate) mod permissions;
pub(crate) mod records;
pub(crate) mod router;
pub(crate) mod store;
#[cfg(test)]
mod tests;
pub(crate) mod types;

pub use self::core::{
    AppConfig, DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_HISTORY_LIMIT,
    DEFAULT_JSON_BODY_LIMIT_BYTES, DEFAULT_MAX_CHANNELS_PER_COMMUNITY,
    DEFAULT_MAX_COMMUNITIES_PER_USER, DEFAULT_MAX_HISTORY_LIMIT, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE, DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use errors::init_tracing;
pub use router::build_router;
