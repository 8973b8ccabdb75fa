//! Conversation logic for the SunoAI backend
//!
//! This crate provides the conversational session store, context building,
//! local intercepts and story generation.

pub mod context;
pub mod conversation;
pub mod intercept;
pub mod story;

pub use context::ContextBuilder;
pub use conversation::{Conversation, ReplySource, TurnError, TurnReply};
pub use intercept::{DateIntercept, DateZone};
pub use story::{GeneratedStory, StoryError, StoryGenerator, StoryRequest};
