pub mod function_cache;

pub use function_cache::{CacheStats, ImplementationCache};
