//! RSS/Atom feed fetching and parsing.

mod client;
mod fetcher;
mod parser;
mod types;
mod util;

pub use self::client::create_http_client;
pub use self::fetcher::{FeedFetcher, HttpFeedFetcher};
pub use self::parser::parse_feed;
pub use self::types::*;
pub use self::util::{cleanup_xml, is_valid_url};
