//! Agent Integration
//!
//! The agent is the long-running, tool-using assistant a request is
//! delegated to. It is reached through the [`Agent`] trait so the streaming
//! pipeline never depends on a particular provider.
//!
//! # Available Agents
//!
//! - **ChatCompletions**: any OpenAI-compatible `/chat/completions` endpoint
//!
//! # Usage
//!
//! ```ignore
//! use relay_core::agent::{Agent, AgentRequest, ChatCompletionsAgent};
//! use relay_core::config::load_config;
//! use relay_core::progress::ProgressChannel;
//!
//! let config = load_config()?;
//! let agent = ChatCompletionsAgent::from_config(&config.agent)?;
//! let channel = ProgressChannel::new();
//! let answer = agent.invoke(&AgentRequest::new("trim clip.mp4"), &channel.sender()).await?;
//! ```

pub mod catalog;
mod openai;
pub mod prompt;
mod traits;

pub use catalog::{default_catalog, ToolCatalog, ToolDescriptor};
pub use openai::ChatCompletionsAgent;
pub use prompt::{attach_selected_files, build_system_prompt, SelectedFile};
pub use traits::{Agent, AgentConfig, AgentError, AgentRequest};
