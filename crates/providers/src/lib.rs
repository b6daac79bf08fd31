//! LLM provider implementations for IronMind.
//!
//! - `openai_compat`: OpenAI-compatible chat completions with function
//!   calling (Groq and friends speak this dialect)
//! - `rate_limit`: sliding-window request limiter
//! - `client`: the `LlmClient` wrapper adding rate limiting, retry with
//!   exponential backoff, token accounting, and tool-use-failure surfacing

pub mod client;
pub mod openai_compat;
pub mod rate_limit;

pub use client::LlmClient;
pub use openai_compat::OpenAiCompatProvider;
pub use rate_limit::RateLimiter;
