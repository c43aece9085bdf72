pub mod db;
pub mod scorer;

pub use db::StoreAdapter;
pub use scorer::OpenAiScorerAdapter;
