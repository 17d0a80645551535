mod client;
mod generation;
mod rate_limit;

pub use client::{AiClient, AiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use generation::{GenerationReport, GenerationRequest, GenerationService, MAX_GENERATION_COUNT};
pub use rate_limit::{DEFAULT_COOLDOWN_SECS, RateLimiter};
