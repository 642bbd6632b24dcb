//! Agent backend abstraction
//!
//! - [`AgentBackend`]: streamed query interface to the conversational agent
//! - [`HttpAgentBackend`]: NDJSON over HTTP
//! - [`EchoAgentBackend`]: local development backend
//! - [`query_agent`]: runs a query and narrates it as activity telemetry

pub mod base;
pub mod echo;
pub mod http;
pub mod relay;
pub mod tools;

pub use base::{AgentBackend, AgentError, AgentEvent, AgentResult, SharedAgent};
pub use echo::EchoAgentBackend;
pub use http::HttpAgentBackend;
pub use relay::{AgentReply, new_request_id, query_agent};
pub use tools::{ToolDisplay, ToolDisplayMap, extract_error_detail, is_error_response};
