//! Getting entries out of a playlist: acquisition, decoding and parsing.

pub mod fetch;
pub mod m3u_parser;

pub use fetch::{PlaylistFetcher, decode_text};
pub use m3u_parser::parse;
