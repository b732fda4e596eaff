pub mod accounts;
pub mod bakers;
pub mod blocks;
pub mod fees;
pub mod reset;
pub mod rights;

pub use accounts::AccountsProcessor;
pub use bakers::BakersProcessor;
pub use blocks::BlocksProcessor;
pub use fees::FeeAggregator;
pub use reset::AccountsResetHandler;
pub use rights::RightsProcessor;
