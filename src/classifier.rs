//! Resolution of free-text zone and usage-type strings to canonical categories.
//!
//! Every category is a row in a table: its canonical id, known spellings and
//! keywords. A candidate string belongs to a category when the first of these
//! rules holds:
//!
//! 1. case-insensitive equality with the id or an alias
//! 2. equality after stripping everything but letters and digits
//! 3. containment in either direction between the stripped strings
//! 4. the stripped candidate contains one of the category keywords
//! 5. the lower-cased candidate contains the search term
//!
//! Empty or missing candidates never match.

use serde::{Deserialize, Serialize};
use std::iter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Exact,
    Normalized,
    Containment,
    Keyword,
    Substring,
}

impl MatchRule {
    pub const ORDER: [MatchRule; 5] = [
        MatchRule::Exact,
        MatchRule::Normalized,
        MatchRule::Containment,
        MatchRule::Keyword,
        MatchRule::Substring,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CategoryDefinition {
    pub fn new(id: &str, aliases: &[&str], keywords: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn terms(&self) -> impl Iterator<Item = &str> {
        iter::once(self.id.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Lower-cases and strips everything that is not a letter or digit, so
/// `Zone_03_(A)`, `ZONE 03 A` and `zone03a` compare equal.
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

struct Candidate {
    lower: String,
    normalized: String,
}

impl Candidate {
    fn prepare(raw: Option<&str>) -> Option<Self> {
        let trimmed = raw?.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            lower: trimmed.to_lowercase(),
            normalized: normalize(trimmed),
        })
    }
}

fn rule_applies(
    rule: MatchRule,
    candidate: &Candidate,
    terms: &[&str],
    keywords: &[String],
    search: &str,
) -> bool {
    match rule {
        MatchRule::Exact => terms.iter().any(|t| t.trim().to_lowercase() == candidate.lower),
        MatchRule::Normalized => terms.iter().any(|t| {
            let n = normalize(t);
            !n.is_empty() && n == candidate.normalized
        }),
        MatchRule::Containment => {
            !candidate.normalized.is_empty()
                && terms.iter().any(|t| {
                    let n = normalize(t);
                    !n.is_empty()
                        && (candidate.normalized.contains(&n) || n.contains(&candidate.normalized))
                })
        }
        MatchRule::Keyword => keywords.iter().any(|k| {
            let n = normalize(k);
            !n.is_empty() && candidate.normalized.contains(&n)
        }),
        MatchRule::Substring => {
            let search = search.trim().to_lowercase();
            !search.is_empty() && candidate.lower.contains(&search)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifier {
    categories: Vec<CategoryDefinition>,
}

impl Classifier {
    pub fn new(categories: Vec<CategoryDefinition>) -> Self {
        Self { categories }
    }

    /// Usage types seen in the meter register, with the spellings the
    /// register actually uses.
    pub fn usage_types() -> Self {
        Self::new(vec![
            CategoryDefinition::new(
                "Irrigation",
                &["IRR_Servies", "IRR_Services"],
                &["irrigat", "irrig", "irr_servies", "garden", "landscape"],
            ),
            CategoryDefinition::new(
                "Commercial",
                &["Retail"],
                &["retail", "business", "office"],
            ),
            CategoryDefinition::new(
                "Residential",
                &["Residential (Villa)", "Residential (Apart)"],
                &["villa", "apart", "house", "home"],
            ),
            CategoryDefinition::new(
                "Common",
                &["MB_Common", "D_Building_Common"],
                &["shared", "community"],
            ),
            CategoryDefinition::new("Building", &["D_Building_Bulk"], &["structure"]),
            CategoryDefinition::new("Bulk", &["Zone Bulk", "Main Bulk"], &[]),
        ])
    }

    /// Zone catalog with the spellings found across data loads.
    pub fn zones() -> Self {
        Self::new(vec![
            CategoryDefinition::new(
                "Zone_01_(FM)",
                &["ZONE_01_(FM)", "Zone 01 (FM)", "Zone_01_FM", "Zone 01"],
                &[],
            ),
            CategoryDefinition::new(
                "Zone_03_(A)",
                &["ZONE_03_(A)", "Zone 03 (A)", "Zone_03_A", "Zone 03A"],
                &[],
            ),
            CategoryDefinition::new(
                "Zone_03_(B)",
                &["ZONE_03_(B)", "Zone 03 (B)", "Zone_03_B", "Zone 03B"],
                &[],
            ),
            CategoryDefinition::new("Zone_05", &["ZONE_05", "Zone 05", "Zone05", "Z05"], &[]),
            CategoryDefinition::new(
                "Zone_08",
                &["ZONE_08", "Zone 08", "Zone08", "Z08", "Zone_08_(North_Golf)"],
                &[],
            ),
            CategoryDefinition::new("Zone_VS", &["ZONE_VS", "Zone VS", "ZoneVS", "ZVS"], &[]),
            CategoryDefinition::new("Zone_SC", &["ZONE_SC", "Zone SC", "ZoneSC", "ZSC"], &[]),
        ])
    }

    pub fn categories(&self) -> &[CategoryDefinition] {
        &self.categories
    }

    /// Looks up the table row for a target given by id or alias, in any spelling.
    pub fn definition(&self, target: &str) -> Option<&CategoryDefinition> {
        let wanted = normalize(target);
        if wanted.is_empty() {
            return None;
        }
        self.categories
            .iter()
            .find(|c| c.terms().any(|t| normalize(t) == wanted))
    }

    /// The first rule under which `candidate` belongs to `target`, if any.
    /// Targets absent from the table are matched on their own spelling only.
    pub fn match_rule(&self, candidate: Option<&str>, target: &str) -> Option<MatchRule> {
        let candidate = Candidate::prepare(candidate)?;
        let search = target.trim();
        if search.is_empty() {
            return None;
        }

        let definition = self.definition(search);
        let mut terms: Vec<&str> = vec![search];
        let keywords: &[String] = match definition {
            Some(def) => {
                terms.extend(def.terms());
                &def.keywords
            }
            None => &[],
        };

        MatchRule::ORDER
            .iter()
            .copied()
            .find(|rule| rule_applies(*rule, &candidate, &terms, keywords, search))
    }

    pub fn matches(&self, candidate: Option<&str>, target: &str) -> bool {
        self.match_rule(candidate, target).is_some()
    }

    /// Canonical id for a free-text value. Stronger rules win across the
    /// whole table before weaker ones are tried; table order breaks ties.
    pub fn resolve(&self, candidate: Option<&str>) -> Option<&str> {
        let candidate = Candidate::prepare(candidate)?;

        for rule in MatchRule::ORDER {
            for category in &self.categories {
                let terms: Vec<&str> = category.terms().collect();
                if rule_applies(rule, &candidate, &terms, &category.keywords, &category.id) {
                    return Some(category.id.as_str());
                }
            }
        }

        None
    }
}
