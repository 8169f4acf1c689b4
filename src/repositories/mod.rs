pub mod bet_repository;
pub mod club_repository;
pub mod journal_repository;
pub mod market_repository;
pub mod settings_repository;
pub mod transaction_repository;
pub mod user_repository;

// Re-export all repositories for convenient access
pub use bet_repository::BetRepository;
pub use club_repository::ClubRepository;
pub use journal_repository::JournalRepository;
pub use market_repository::MarketRepository;
pub use settings_repository::SettingsRepository;
pub use transaction_repository::{RequestKind, TransactionRepository};
pub use user_repository::UserRepository;
