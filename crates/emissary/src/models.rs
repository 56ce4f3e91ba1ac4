//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - openai-style messages/tools, sent from the agent to the LLM
//! - tool dispatch requests, sent from the agent to the registry
//!
//! These overlap but are not identical, so wire payloads are converted to
//! and from the internal structs at the provider boundary rather than used
//! directly.
pub mod message;
pub mod role;
pub mod tool;
