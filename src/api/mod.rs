//! API Module
//!
//! Chat completion wire types.

pub mod completion;

pub use completion::{
    Choice, ChoiceMessage, CompletionRequest, CompletionResponse, Message, Role, Usage,
};
