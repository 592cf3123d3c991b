//! These models represent the objects passed around by the agent
//!
//! There are two formats we need to interact with:
//! - anthropic messages/tools, sent from the agent to the LLM
//! - tool calls, sent from the agent to the systems providing market data
//!
//! We always immediately convert the wire format into the internal structs using the
//! helpers in `providers::utils`, so the rest of the crate never touches raw JSON messages.
pub mod message;
pub mod role;
pub mod tool;
