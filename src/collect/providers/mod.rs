// src/collect/providers/mod.rs
pub mod arxiv;
pub mod coingecko;
pub mod github;
pub mod google_news;
pub mod reddit;
pub mod wikipedia;

/// Content cap applied by every provider after normalization.
pub(crate) const MAX_CONTENT_CHARS: usize = 1500;
