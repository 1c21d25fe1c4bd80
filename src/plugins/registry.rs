use super::OddsSourcePlugin;
use crate::models::Sport;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Adapters ordered by priority, plus per-sport last-resort adapters.
///
/// Filled once at startup and shared read-only afterwards.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn OddsSourcePlugin>>,
    last_resort: HashMap<Sport, Vec<Arc<dyn OddsSourcePlugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter. Ties in priority keep registration order.
    pub fn register(&mut self, plugin: Arc<dyn OddsSourcePlugin>) {
        info!(
            plugin = plugin.name(),
            priority = plugin.priority(),
            "Registered odds source"
        );
        self.plugins.push(plugin);
        // sort_by_key is stable
        self.plugins.sort_by_key(|p| p.priority());
    }

    /// Add an adapter tried only after every regular adapter came up empty
    pub fn register_last_resort(&mut self, sport: Sport, plugin: Arc<dyn OddsSourcePlugin>) {
        info!(plugin = plugin.name(), sport = %sport, "Registered last-resort odds source");
        self.last_resort.entry(sport).or_default().push(plugin);
    }

    /// Adapters supporting `sport`, lowest priority first
    pub fn plugins_for(&self, sport: Sport) -> Vec<Arc<dyn OddsSourcePlugin>> {
        self.plugins
            .iter()
            .filter(|p| p.supported_sports().contains(sport))
            .cloned()
            .collect()
    }

    pub fn last_resort_for(&self, sport: Sport) -> Vec<Arc<dyn OddsSourcePlugin>> {
        self.last_resort.get(&sport).cloned().unwrap_or_default()
    }

    /// Regular adapters followed by every last-resort adapter
    pub fn all(&self) -> Vec<Arc<dyn OddsSourcePlugin>> {
        let mut all = self.plugins.clone();
        all.extend(self.last_resort.values().flatten().cloned());
        all
    }

    /// Every regular adapter name in priority order
    pub fn names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len() + self.last_resort.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::ProviderGame;
    use crate::plugins::SupportedSports;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct Named {
        name: &'static str,
        priority: u32,
        sports: SupportedSports,
    }

    #[async_trait]
    impl OddsSourcePlugin for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn supported_sports(&self) -> SupportedSports {
            self.sports.clone()
        }

        async fn fetch_odds(
            &self,
            _sport: Sport,
            _date: NaiveDate,
        ) -> Result<Vec<ProviderGame>, ProviderError> {
            Ok(vec![])
        }
    }

    fn plugin(name: &'static str, priority: u32, sports: SupportedSports) -> Arc<dyn OddsSourcePlugin> {
        Arc::new(Named {
            name,
            priority,
            sports,
        })
    }

    #[test]
    fn test_plugins_sorted_by_priority_with_stable_ties() {
        let mut registry = PluginRegistry::new();
        registry.register(plugin("c", 30, SupportedSports::All));
        registry.register(plugin("a", 10, SupportedSports::All));
        registry.register(plugin("b1", 20, SupportedSports::All));
        registry.register(plugin("b2", 20, SupportedSports::All));

        assert_eq!(registry.names(), vec!["a", "b1", "b2", "c"]);
    }

    #[test]
    fn test_plugins_for_filters_by_sport() {
        let mut registry = PluginRegistry::new();
        registry.register(plugin("nascar-only", 5, SupportedSports::Only(vec![Sport::Nascar])));
        registry.register(plugin("teams", 10, SupportedSports::Only(Sport::TEAM_SPORTS.to_vec())));
        registry.register(plugin("everything", 20, SupportedSports::All));

        let nhl: Vec<String> = registry
            .plugins_for(Sport::Nhl)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(nhl, vec!["teams", "everything"]);

        let nascar: Vec<String> = registry
            .plugins_for(Sport::Nascar)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(nascar, vec!["nascar-only", "everything"]);
    }

    #[test]
    fn test_last_resort_is_per_sport() {
        let mut registry = PluginRegistry::new();
        registry.register_last_resort(
            Sport::Ncaaf,
            plugin("cfbd", u32::MAX, SupportedSports::Only(vec![Sport::Ncaaf])),
        );

        assert_eq!(registry.last_resort_for(Sport::Ncaaf).len(), 1);
        assert!(registry.last_resort_for(Sport::Nfl).is_empty());
        assert!(registry.plugins_for(Sport::Ncaaf).is_empty());
        assert_eq!(registry.len(), 1);
    }
}
