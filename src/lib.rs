pub mod chunker;
pub mod fetch;
pub mod generator;
pub mod merger;
pub mod settings;

pub use chunker::{chunk, chunk_document, Chunk, DEFAULT_UNIT_LIMIT};
pub use generator::{combine, generate_all, Fragment, Generate, GenerateError, PromptFlowClient};
pub use merger::{merge, merge_with, Grammar, OutputBlock, Syntax};
pub use settings::Settings;
