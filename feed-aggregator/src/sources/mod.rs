pub mod static_feed;

pub use static_feed::StaticFetchSource;
