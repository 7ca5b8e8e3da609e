//! Generation-side components of a CBT session turn.
//!
//! - [`Generator`]: the `generate(prompt) -> text` contract over a provider
//! - [`MessageClassifier`]: routes a message to one of five categories
//! - [`ContextSummarizer`]: compresses long histories
//! - [`SimpleResponder`]: single-call replies for greeting/procedural/small talk
//! - [`ConclusionGenerator`]: the closing message of a session
//! - [`Pipeline`]: retrieval → assessment → technique selection → response

pub mod classifier;
pub mod conclusion;
pub mod generator;
pub mod pipeline;
pub mod prompts;
pub mod responder;
pub mod summarizer;
pub mod techniques;

#[cfg(any(test, feature = "test-util"))]
pub mod test_helpers;

pub use classifier::MessageClassifier;
pub use conclusion::{Conclusion, ConclusionGenerator};
pub use generator::Generator;
pub use pipeline::{Pipeline, PipelineContext, PipelineError, PipelineStage, Stage};
pub use prompts::{PromptError, PromptTemplate};
pub use responder::SimpleResponder;
pub use summarizer::{ContextSummarizer, Summary};
pub use techniques::CbtTechnique;
