mod decode;
mod llm_client;
mod prompt;
mod runner;
mod scoring;

pub use decode::{decode_json_field, decode_label, decode_substring, DecodedLabel};
pub use llm_client::{LlmClient, MockLlmClient, OpenAiChatClient};
pub use prompt::PromptBuilder;
pub use runner::{
    read_subset_csv, write_predictions_csv, ClassifierRunner, RunOptions, RunOutcome,
};
pub use scoring::{accuracy, AccuracySummary, ConfusionMatrix};
