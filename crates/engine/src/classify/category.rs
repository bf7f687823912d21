//! Instance type category classification by family prefix.

use serde::{Deserialize, Serialize};

use crate::errors::MappingError;
use crate::models::Category;

/// Instance types of the `prefix` family belong to `category`.
///
/// A prefix ending in a letter only matches when the id does not continue
/// with another letter: `"m"` covers `m5.large` and `m6i.xlarge`, but not
/// `mystery` or `mac1.metal`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub prefix: String,
    pub category: Category,
}

impl CategoryRule {
    pub fn new(prefix: impl Into<String>, category: Category) -> Self {
        Self {
            prefix: prefix.into(),
            category,
        }
    }

    /// `instance_type` must already be lowercased.
    fn matches(&self, instance_type: &str) -> bool {
        let Some(rest) = instance_type.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        let family_ends = !self.prefix.ends_with(|c: char| c.is_ascii_alphabetic());
        family_ends || !rest.starts_with(|c: char| c.is_ascii_alphabetic())
    }
}

/// Maps instance type ids to categories; the longest matching prefix wins.
#[derive(Clone, Debug)]
pub struct CategoryMapper {
    rules: Vec<CategoryRule>,
}

impl CategoryMapper {
    pub fn new(mut rules: Vec<CategoryRule>) -> Self {
        for rule in &mut rules {
            rule.prefix.make_ascii_lowercase();
        }
        rules.retain(|rule| !rule.prefix.is_empty());
        rules.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { rules }
    }

    pub fn map_category(&self, instance_type: &str) -> Result<Category, MappingError> {
        let normalized = instance_type.to_ascii_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&normalized))
            .map(|rule| rule.category)
            .ok_or_else(|| MappingError::UnknownCategory(instance_type.to_string()))
    }
}

impl Default for CategoryMapper {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

/// Family prefixes of the common providers.
pub fn default_rules() -> Vec<CategoryRule> {
    use Category::*;

    [
        // Alibaba ECS families
        ("ecs.g", General),
        ("ecs.hfg", General),
        ("ecs.sn2", General),
        ("ecs.c", Compute),
        ("ecs.hfc", Compute),
        ("ecs.ic", Compute),
        ("ecs.sn1", Compute),
        ("ecs.r", Memory),
        ("ecs.re", Memory),
        ("ecs.hfr", Memory),
        ("ecs.se", Memory),
        ("ecs.gn", Gpu),
        ("ecs.vgn", Gpu),
        ("ecs.f", Gpu),
        ("ecs.t", Burst),
        ("ecs.d", Storage),
        ("ecs.i", Storage),
        // AWS EC2 families
        ("m", General),
        ("a1", General),
        ("c", Compute),
        ("r", Memory),
        ("x", Memory),
        ("z", Memory),
        ("p", Gpu),
        ("g", Gpu),
        ("inf", Gpu),
        ("t", Burst),
        ("i", Storage),
        ("d", Storage),
        ("h", Storage),
    ]
    .into_iter()
    .map(|(prefix, category)| CategoryRule::new(prefix, category))
    .collect()
}
