//! LLM and provider integrations for the meal planner.
//!
//! This crate hosts every call that leaves the process:
//! - **Calendar extraction** (`calendar`) - free-form availability text to a
//!   day-keyed attendance map
//! - **Recipe selection** (`selection`) - pick one candidate per slot given
//!   the attendees' aggregated dietary needs
//! - **Recipe modification** (`modification`) - adapt a live recipe's
//!   ingredients and instructions to the people actually eating it
//! - **Recipe information** (`recipe_info`) - live recipe lookup against the
//!   external provider, with quota- and rate-limit-aware retries
//!
//! # Safety Principle
//!
//! The LLM translates and adapts; it never decides what gets persisted.
//! Which slots exist, which rows are written, and how failures degrade are
//! deterministic decisions made by the workflow engine.

pub mod calendar;
pub mod llm;
pub mod modification;
pub mod recipe_info;
pub mod selection;

pub use calendar::CalendarExtractor;
pub use llm::{parse_structured, LlmClient, LlmError, OpenAiChatClient};
pub use modification::RecipeModifier;
pub use recipe_info::{
    fetch_with_retries, HttpRecipeInfoClient, ProviderError, RecipeInfoProvider,
};
pub use selection::RecipeSelector;
