//! External search and content fetch.
//!
//! The orchestrator only sees two narrow contracts: [`SearchGateway`] for
//! query → results, and [`ContentFetcher`] for url → page text. The bundled
//! implementations use DuckDuckGo via daedra; [`CachedSearchGateway`] adds a
//! database-backed TTL cache keyed by a normalized hash of the query.

pub mod fetcher;
pub mod gateway;

pub use fetcher::{ContentFetcher, WebContentFetcher};
pub use gateway::{CachedSearchGateway, SearchGateway, WebSearchGateway};
