#![forbid(unsafe_code)]

mod server;

pub use server::{
    build_router, init_tracing, AppConfig, DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_HISTORY_LIMIT,
    DEFAULT_JSON_BODY_LIMIT_BYTES, DEFAULT_MAX_CHANNELS_PER_COMMUNITY,
    DEFAULT_MAX_COMMUNITIES_PER_USER, DEFAULT_MAX_HISTORY_LIMIT, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE, DEFAULT_REQUEST_TIMEOUT_SECS,
};
