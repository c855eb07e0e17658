pub mod human_format;
pub mod url;

pub use human_format::{format_duration, format_latency};
pub use url::UrlUtils;
