pub mod cache;
pub mod service;
pub mod source;

pub use cache::QuoteCache;
pub use service::QuoteService;
pub use source::{HttpQuoteSource, QuoteSource};
