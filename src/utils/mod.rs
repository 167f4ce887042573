//! Utility functions and helpers.

pub mod http;
pub mod url;

pub use self::http::create_async_client;
pub use self::url::ApiUrls;
