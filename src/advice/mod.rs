//! Design advice module.

mod gemini;
mod provider;

pub use gemini::GeminiAdviceProvider;
pub use provider::{advice_prompt, resolve_advice, AdviceProvider, ADVICE_FAILED, NO_ADVICE};
