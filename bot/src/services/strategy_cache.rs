//! Parsed-strategy memo keyed by script content

use dashmap::DashMap;
use signal_engine::strategy::{ParseError, ParsedStrategy, StrategyParser};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub struct StrategyCache {
    parser: StrategyParser,
    parsed: DashMap<u64, Arc<ParsedStrategy>>,
}

impl StrategyCache {
    pub fn new(parser: StrategyParser) -> Self {
        Self {
            parser,
            parsed: DashMap::new(),
        }
    }

    fn key(script: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        script.hash(&mut hasher);
        hasher.finish()
    }

    /// Parse failures are not cached so an edited script is retried
    pub fn get_or_parse(&self, script: &str) -> Result<Arc<ParsedStrategy>, ParseError> {
        let key = Self::key(script);
        if let Some(strategy) = self.parsed.get(&key) {
            return Ok(strategy.clone());
        }

        let strategy = Arc::new(self.parser.parse(script)?);
        self.parsed.insert(key, strategy.clone());
        Ok(strategy)
    }

    pub fn len(&self) -> usize {
        self.parsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_engine::strategy::ParseFailurePolicy;

    #[test]
    fn test_scripts_are_parsed_once() {
        let cache = StrategyCache::new(StrategyParser::default());
        let first = cache.get_or_parse("ta.crossover(ta.ema(close, 9), ta.ema(close, 21))").unwrap();
        let second = cache.get_or_parse("ta.crossover(ta.ema(close, 9), ta.ema(close, 21))").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_rejected_scripts_are_not_cached() {
        let cache = StrategyCache::new(StrategyParser::new(ParseFailurePolicy::Reject));
        assert!(cache.get_or_parse("nothing to see").is_err());
        assert!(cache.is_empty());
    }
}
