pub mod db;
pub mod extract;
pub mod fallback_llm;
pub mod llm;
pub mod storage;
pub mod thumbnail;

pub use db::DbAdapter;
pub use extract::DocumentTextExtractor;
pub use fallback_llm::LocalFallbackAdapter;
pub use llm::OpenAiLlmAdapter;
pub use storage::GcsStorageAdapter;
pub use thumbnail::PngThumbnailGenerator;
