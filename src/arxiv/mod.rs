pub mod atom;
pub mod client;

pub use atom::parse_feed;
pub use client::{
    ARXIV_BASE_URL, ArxivClient, ArxivConfig, FeedEntry, FeedError, FeedPage, PaperFeed,
};
