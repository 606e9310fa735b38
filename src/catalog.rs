//! Reference data: which goods exist and how to describe them.
//!
//! `JsonCatalog` loads a snapshot file with four tables:
//!
//! ```json
//! {
//!   "nations": [{"id": 14, "name": "England", "abbr": "ENG"}],
//!   "leagues": [{"id": 13, "name": "Premier League", "abbr": "ENG 1"}],
//!   "clubs":   [{"id": 1, "name": "Arsenal", "abbr": "ARS"}],
//!   "goods":   [{"resourceId": 20801, "name": "...", "rating": 94, ...}]
//! }
//! ```

use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::storage;
use crate::types::{rarity_label, GoodDefinition};

/// Lookup of good definitions.
pub trait GoodsCatalog: Send + Sync {
    /// Definition of a good, `None` when unknown.
    fn resolve(&self, resource_id: u64) -> Option<GoodDefinition>;

    /// Goods matching a numeric id, a club/league/nation abbreviation, or a
    /// case-insensitive name substring, tried in that order.
    fn find(&self, query: &str) -> Vec<GoodDefinition>;

    /// One-line description for logs.
    fn describe(&self, good: &GoodDefinition) -> String;

    /// Abbreviation of a league, e.g. `"ENG 1"`.
    fn league_abbr(&self, league_id: u32) -> Option<String>;
}

/// A nation, league or club.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Affiliation {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub abbr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    nations: Vec<Affiliation>,
    #[serde(default)]
    leagues: Vec<Affiliation>,
    #[serde(default)]
    clubs: Vec<Affiliation>,
    #[serde(default)]
    goods: Vec<GoodDefinition>,
}

/// Catalog backed by a JSON snapshot held in memory.
#[derive(Debug, Default)]
pub struct JsonCatalog {
    nations: HashMap<u32, Affiliation>,
    leagues: HashMap<u32, Affiliation>,
    clubs: HashMap<u32, Affiliation>,
    /// In file order, so `find` results are stable.
    goods: Vec<GoodDefinition>,
    by_id: HashMap<u64, usize>,
}

impl JsonCatalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file: CatalogFile = storage::load_json(path)?;
        let catalog = Self::from_parts(file.nations, file.leagues, file.clubs, file.goods);
        info!(
            nations = catalog.nations.len(),
            leagues = catalog.leagues.len(),
            clubs = catalog.clubs.len(),
            goods = catalog.goods.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_parts(
        nations: Vec<Affiliation>,
        leagues: Vec<Affiliation>,
        clubs: Vec<Affiliation>,
        goods: Vec<GoodDefinition>,
    ) -> Self {
        let index = |v: Vec<Affiliation>| -> HashMap<u32, Affiliation> {
            v.into_iter().map(|a| (a.id, a)).collect()
        };
        let by_id: HashMap<u64, usize> = goods
            .iter()
            .enumerate()
            .map(|(i, g)| (g.resource_id, i))
            .collect();
        Self {
            nations: index(nations),
            leagues: index(leagues),
            clubs: index(clubs),
            goods,
            by_id,
        }
    }

    /// Catalog of bare goods, no affiliations.
    pub fn with_goods(goods: Vec<GoodDefinition>) -> Self {
        Self::from_parts(Vec::new(), Vec::new(), Vec::new(), goods)
    }

    pub fn len(&self) -> usize {
        self.goods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goods.is_empty()
    }

    fn abbr(table: &HashMap<u32, Affiliation>, id: Option<u32>) -> String {
        id.and_then(|id| table.get(&id))
            .map(|a| a.abbr.clone().unwrap_or_else(|| a.name.clone()))
            .unwrap_or_else(|| "-".to_string())
    }

    fn by_affiliation(&self, query: &str) -> Vec<GoodDefinition> {
        let matches = |table: &HashMap<u32, Affiliation>| -> Option<u32> {
            table
                .values()
                .find(|a| a.abbr.as_deref().is_some_and(|ab| ab.eq_ignore_ascii_case(query)))
                .map(|a| a.id)
        };
        if let Some(id) = matches(&self.clubs) {
            return self.goods.iter().filter(|g| g.club == Some(id)).cloned().collect();
        }
        if let Some(id) = matches(&self.leagues) {
            return self.goods.iter().filter(|g| g.league == Some(id)).cloned().collect();
        }
        if let Some(id) = matches(&self.nations) {
            return self.goods.iter().filter(|g| g.nation == Some(id)).cloned().collect();
        }
        Vec::new()
    }
}

impl GoodsCatalog for JsonCatalog {
    fn resolve(&self, resource_id: u64) -> Option<GoodDefinition> {
        self.by_id.get(&resource_id).map(|&i| self.goods[i].clone())
    }

    fn find(&self, query: &str) -> Vec<GoodDefinition> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        if let Ok(rid) = query.parse::<u64>() {
            return self.resolve(rid).into_iter().collect();
        }
        let by_affiliation = self.by_affiliation(query);
        if !by_affiliation.is_empty() {
            return by_affiliation;
        }
        let needle = query.to_lowercase();
        self.goods
            .iter()
            .filter(|g| g.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    fn describe(&self, good: &GoodDefinition) -> String {
        format!(
            "{} {} {} {} {}/{}/{}",
            good.name,
            good.rating,
            rarity_label(good.rare_flag),
            good.position.as_deref().unwrap_or("-"),
            Self::abbr(&self.clubs, good.club),
            Self::abbr(&self.leagues, good.league),
            Self::abbr(&self.nations, good.nation),
        )
    }

    fn league_abbr(&self, league_id: u32) -> Option<String> {
        self.leagues.get(&league_id).and_then(|l| l.abbr.clone())
    }
}
