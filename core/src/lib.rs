pub mod broadcaster;
pub mod conductor;
pub mod config;
pub mod corpus;
pub mod directional;
pub mod distance;
pub mod diversity;
pub mod errors;
pub mod explorer;
pub mod fingerprint;
pub mod kdtree;
pub mod logger;
pub mod mixdown_cache;
pub mod mixer;
pub mod sinks;
pub mod test_support;
