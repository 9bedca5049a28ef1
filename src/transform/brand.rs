//! Persona name rewriting between the public face and the backend bot.

use crate::config::PersonaConfig;
use anyhow::{Context, Result};
use regex::{Captures, Regex};

/// Case-insensitive whole-word replacement of a fixed set of terms in one pass.
///
/// All terms are matched by a single alternation, so a replacement is never
/// itself rewritten by another pair during the same call. Applying the map
/// twice can still rewrite again; it is not idempotent in general.
#[derive(Debug, Clone)]
struct TermMap {
    pattern: Option<Regex>,
    /// `(lowercased term, replacement)`
    replacements: Vec<(String, String)>,
}

impl TermMap {
    fn new(pairs: &[(&str, &str)]) -> Result<Self> {
        let replacements: Vec<(String, String)> = pairs
            .iter()
            .map(|(from, to)| (from.trim(), *to))
            .filter(|(from, _)| !from.is_empty())
            .map(|(from, to)| (from.to_lowercase(), to.to_string()))
            .collect();

        if replacements.is_empty() {
            return Ok(Self {
                pattern: None,
                replacements,
            });
        }

        let alternation = replacements
            .iter()
            .map(|(from, _)| regex::escape(from))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
            .with_context(|| format!("Invalid persona term pattern: {alternation}"))?;

        Ok(Self {
            pattern: Some(pattern),
            replacements,
        })
    }

    fn apply(&self, text: &str) -> String {
        let Some(pattern) = self.pattern.as_ref() else {
            return text.to_string();
        };
        pattern
            .replace_all(text, |caps: &Captures<'_>| {
                let matched = &caps[0];
                let key = matched.to_lowercase();
                self.replacements
                    .iter()
                    .find(|(from, _)| *from == key)
                    .map_or_else(|| matched.to_string(), |(_, to)| to.clone())
            })
            .into_owned()
    }
}

/// Rewrites user text toward the backend persona and replies back toward the public one.
#[derive(Debug, Clone)]
pub struct BrandRewriter {
    to_backend: TermMap,
    to_public: TermMap,
    backend_biography: String,
    public_biography: String,
}

impl BrandRewriter {
    pub fn new(persona: &PersonaConfig) -> Result<Self> {
        let to_backend = TermMap::new(&[
            (persona.public_name.as_str(), persona.backend_name.as_str()),
            (persona.public_company.as_str(), persona.backend_company.as_str()),
        ])?;
        let to_public = TermMap::new(&[
            (persona.backend_company.as_str(), persona.public_company.as_str()),
            (persona.backend_name.as_str(), persona.public_name.as_str()),
        ])?;
        Ok(Self {
            to_backend,
            to_public,
            backend_biography: persona.backend_biography.trim().to_string(),
            public_biography: persona.public_biography.trim().to_string(),
        })
    }

    /// User text on its way to the backend.
    pub fn to_backend(&self, text: &str) -> String {
        self.to_backend.apply(text)
    }

    /// Backend reply on its way to the user.
    ///
    /// A reply carrying the backend's canned biography is replaced wholesale.
    pub fn to_public(&self, text: &str) -> String {
        if !self.backend_biography.is_empty() && text.contains(&self.backend_biography) {
            return self.public_biography.clone();
        }
        self.to_public.apply(text)
    }
}
