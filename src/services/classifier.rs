//! Keyword-based channel classification
//!
//! Rules are evaluated in declaration order and the first category with any
//! keyword contained in the display name wins.

use crate::models::{CategoryRule, ClassifiedEntry, Entry, UnmatchedPolicy};

/// Find the category for `name`, if any.
///
/// Matching is a plain substring test. When `case_sensitive` is false both
/// sides are Unicode-lowercased first.
pub fn classify<'a>(name: &str, rules: &'a [CategoryRule], case_sensitive: bool) -> Option<&'a str> {
    if case_sensitive {
        rules
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|k| !k.is_empty() && name.contains(k.as_str()))
            })
            .map(|rule| rule.name.as_str())
    } else {
        let name = name.to_lowercase();
        rules
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|k| !k.is_empty() && name.contains(&k.to_lowercase()))
            })
            .map(|rule| rule.name.as_str())
    }
}

/// Applies the category table plus the unmatched policy to parsed entries.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<CategoryRule>,
    case_sensitive: bool,
    unmatched: UnmatchedPolicy,
    unclassified_label: String,
}

impl Classifier {
    pub fn new(
        rules: Vec<CategoryRule>,
        case_sensitive: bool,
        unmatched: UnmatchedPolicy,
        unclassified_label: impl Into<String>,
    ) -> Self {
        let rules = if case_sensitive {
            rules
        } else {
            rules
                .into_iter()
                .map(|rule| CategoryRule {
                    name: rule.name,
                    keywords: rule.keywords.iter().map(|k| k.to_lowercase()).collect(),
                })
                .collect()
        };

        Self {
            rules,
            case_sensitive,
            unmatched,
            unclassified_label: unclassified_label.into(),
        }
    }

    fn matched_category(&self, name: &str) -> Option<&str> {
        if self.case_sensitive {
            classify(name, &self.rules, true)
        } else {
            // keywords are already lowercase
            classify(&name.to_lowercase(), &self.rules, true)
        }
    }

    /// Category for a single display name after the unmatched policy is applied
    pub fn category_for(&self, name: &str) -> Option<&str> {
        match (self.matched_category(name), self.unmatched) {
            (Some(category), _) => Some(category),
            (None, UnmatchedPolicy::Bucket) => Some(self.unclassified_label.as_str()),
            (None, UnmatchedPolicy::Drop) => None,
        }
    }

    /// Tag entries with their category. Returns the classified entries and the
    /// number of entries no rule matched (dropped or bucketed).
    pub fn classify_all(&self, entries: Vec<(usize, Entry)>) -> (Vec<ClassifiedEntry>, usize) {
        let mut unmatched = 0;
        let mut classified = Vec::with_capacity(entries.len());

        for (position, entry) in entries {
            let category = match self.matched_category(&entry.name) {
                Some(category) => category.to_string(),
                None => {
                    unmatched += 1;
                    match self.unmatched {
                        UnmatchedPolicy::Bucket => self.unclassified_label.clone(),
                        UnmatchedPolicy::Drop => continue,
                    }
                }
            };
            classified.push(ClassifiedEntry {
                position,
                entry,
                category,
            });
        }

        (classified, unmatched)
    }

    /// Category names in output order, including the unclassified bucket when enabled
    pub fn section_order(&self) -> Vec<String> {
        let mut order: Vec<String> = self.rules.iter().map(|r| r.name.clone()).collect();
        if self.unmatched == UnmatchedPolicy::Bucket {
            order.push(self.unclassified_label.clone());
        }
        order
    }
}
