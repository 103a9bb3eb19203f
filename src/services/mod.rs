//! Services: page fetching, timestamp normalization and ordering checks.

pub mod fetcher;
pub mod ordering;
pub mod timestamp;

pub use fetcher::{FetcherFactory, HttpFetcherFactory, HttpPageFetcher, PageFetcher};
