//! LLM domain: completion client, prompts, and retry policy.
//!
//! External code should only use the items exported here.
//!
//!   - client.rs  one HTTP round trip, classified failures
//!   - retry.rs   bounded retries for unreachable failures
//!   - prompts.rs system instructions and the screenshot instruction
//!   - types.rs   wire types + `CompletionError`

pub mod client;
pub mod prompts;
pub mod retry;
pub mod types;

pub use client::{strip_markup, CompletionClient, CompletionService};
pub use retry::{PendingRequest, RetryPolicy};
pub use types::{CompletionError, UserContent};
