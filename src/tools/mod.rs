//! External retrieval tools used by the research gatherers.
//!
//! - [`search`](crate::tools::search) - Web search integration (DuckDuckGo via daedra)

/// Web search provider trait and DuckDuckGo implementation.
pub mod search;

pub use search::{DuckDuckGoSearch, SearchHit, SearchProvider};
