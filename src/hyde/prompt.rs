//! Prompt construction for hypothesis generation
//!
//! A prompt is a pure function of the query and the task style. Generation
//! variance must come from the generator only, so every template here is a
//! fixed string with a single `{query}` slot.

use crate::error::HydeError;
use anyhow::Result;
use std::fmt;
use std::str::FromStr;

/// Named prompting strategy used to shape a hypothesis document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStyle {
    WebSearch,
    WebSearchExpert,
    WebSearchNovice,
    WebSearchIntermediate,
    SciFact,
    ArguAna,
    TrecCovid,
    FiQA,
    DbpediaEntity,
    TrecNews,
}

impl TaskStyle {
    pub const ALL: [TaskStyle; 10] = [
        TaskStyle::WebSearch,
        TaskStyle::WebSearchExpert,
        TaskStyle::WebSearchNovice,
        TaskStyle::WebSearchIntermediate,
        TaskStyle::SciFact,
        TaskStyle::ArguAna,
        TaskStyle::TrecCovid,
        TaskStyle::FiQA,
        TaskStyle::DbpediaEntity,
        TaskStyle::TrecNews,
    ];

    /// The four web-search framings used by the multi-perspective variant.
    pub const WEB_PERSPECTIVES: [TaskStyle; 4] = [
        TaskStyle::WebSearch,
        TaskStyle::WebSearchExpert,
        TaskStyle::WebSearchNovice,
        TaskStyle::WebSearchIntermediate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TaskStyle::WebSearch => "web search",
            TaskStyle::WebSearchExpert => "web search expert",
            TaskStyle::WebSearchNovice => "web search novice",
            TaskStyle::WebSearchIntermediate => "web search intermediate",
            TaskStyle::SciFact => "scifact",
            TaskStyle::ArguAna => "arguana",
            TaskStyle::TrecCovid => "trec covid",
            TaskStyle::FiQA => "fiqa",
            TaskStyle::DbpediaEntity => "dbpedia entity",
            TaskStyle::TrecNews => "trec news",
        }
    }

    fn template(self) -> &'static str {
        match self {
            TaskStyle::WebSearch => {
                "Please write a passage to answer the question.\nQuestion: {query}\nPassage:"
            }
            TaskStyle::WebSearchExpert => {
                "Please write a passage to answer the question the way a domain expert would, \
                 using precise terminology and specific details.\nQuestion: {query}\nPassage:"
            }
            TaskStyle::WebSearchNovice => {
                "Please write a passage to answer the question for someone who is new to the \
                 topic, using plain language and simple explanations.\nQuestion: {query}\nPassage:"
            }
            TaskStyle::WebSearchIntermediate => {
                "Please write a passage to answer the question for a reader with some background \
                 knowledge of the topic.\nQuestion: {query}\nPassage:"
            }
            TaskStyle::SciFact => {
                "Please write a scientific paper passage to support/refute the claim.\nClaim: {query}\nPassage:"
            }
            TaskStyle::ArguAna => {
                "Please write a counter argument for the passage.\nPassage: {query}\nCounter Argument:"
            }
            TaskStyle::TrecCovid => {
                "Please write a scientific paper passage to answer the question.\nQuestion: {query}\nPassage:"
            }
            TaskStyle::FiQA => {
                "Please write a financial article passage to answer the question.\nQuestion: {query}\nPassage:"
            }
            TaskStyle::DbpediaEntity => {
                "Please write a passage to answer the question.\nQuestion: {query}\nPassage:"
            }
            TaskStyle::TrecNews => {
                "Please write a news passage about the topic.\nTopic: {query}\nPassage:"
            }
        }
    }
}

impl fmt::Display for TaskStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskStyle {
    type Err = HydeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = normalize_style_name(s);
        TaskStyle::ALL
            .into_iter()
            .find(|style| style.name() == normalized)
            .ok_or_else(|| HydeError::UnknownTaskStyle {
                name: s.trim().to_string(),
            })
    }
}

/// `TREC_COVID`, `trec-covid` and `Trec Covid` all name the same style.
fn normalize_style_name(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders prompts for one task style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promptor {
    style: TaskStyle,
}

impl Promptor {
    pub fn new(style: TaskStyle) -> Self {
        Self { style }
    }

    /// Builds a promptor from a task style name such as `"web search expert"`.
    pub fn from_task(task: &str) -> Result<Self> {
        let style = task.parse::<TaskStyle>()?;
        Ok(Self::new(style))
    }

    pub fn style(&self) -> TaskStyle {
        self.style
    }

    pub fn build_prompt(&self, query: &str) -> String {
        self.style.template().replace("{query}", query)
    }
}

/// Renders the prompt for `query` under the task style named `task`.
pub fn build_prompt(query: &str, task: &str) -> Result<String> {
    Ok(Promptor::from_task(task)?.build_prompt(query))
}
