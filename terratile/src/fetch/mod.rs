//! Asynchronous tile data fetching
//!
//! Requests go out to a [`DataSource`] on spawned tasks; completions come back
//! over a channel and are correlated with the tile they were issued for.

mod fetcher;
mod source;

pub use fetcher::{
    Delivery, FetchCompletion, FetchError, FetchOutcome, FetchRequest, TileDataFetcher,
    TileFetchError,
};
pub use source::{BoxFuture, DataSource, FileSystemSource, MemorySource, SourceError, SourceRequest};
