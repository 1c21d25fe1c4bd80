//! Provider adapter contract.
//!
//! Each upstream (paid API, scraped page, aggregator) sits behind one
//! `OddsSourcePlugin`. The orchestrator only ever talks to this trait.

pub mod registry;

pub use registry::PluginRegistry;

use crate::error::ProviderError;
use crate::models::{ProviderGame, Sport};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Which sports an adapter can answer for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupportedSports {
    All,
    Only(Vec<Sport>),
}

impl SupportedSports {
    pub fn contains(&self, sport: Sport) -> bool {
        match self {
            SupportedSports::All => true,
            SupportedSports::Only(sports) => sports.contains(&sport),
        }
    }
}

#[async_trait]
pub trait OddsSourcePlugin: Send + Sync {
    /// Stable name, also used as the `source` of every row it produces
    fn name(&self) -> &str;

    /// Lower runs first
    fn priority(&self) -> u32;

    fn supported_sports(&self) -> SupportedSports;

    /// Odds for every game of `sport` on `date`.
    ///
    /// `Ok(vec![])` means the provider answered and has no games. Anything
    /// that kept the provider from answering is an `Err`.
    async fn fetch_odds(
        &self,
        sport: Sport,
        date: NaiveDate,
    ) -> Result<Vec<ProviderGame>, ProviderError>;
}
