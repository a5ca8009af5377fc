pub mod db;
pub mod speech;
pub mod summarizer;

pub use db::DbAdapter;
pub use speech::CommandSpeechEngine;
pub use summarizer::HttpSummarizer;
