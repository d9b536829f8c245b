// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

const FALLBACK_PHRASE: &str = "Hello!";

#[derive(Debug, Error)]
pub enum PhraseError {
    #[error("IO error reading phrase table: {0}")]
    Io(#[from] std::io::Error),
    #[error("Phrase table is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Localised phrase pools used when rendering directives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhraseBook {
    pub encouragement: Vec<String>,
    /// Topic → analogy grounded in the learner's everyday surroundings.
    pub analogies: BTreeMap<String, String>,
}

impl Default for PhraseBook {
    fn default() -> Self {
        let encouragement = [
            "ਤੁਸੀਂ ਬਹੁਤ ਚੰਗਾ ਕੰਮ ਕਰ ਰਹੇ ਹੋ! (You're doing great!)",
            "ਸ਼ਾਬਾਸ਼! (Well done!)",
            "ਤੁਸੀਂ ਇਹ ਕਰ ਸਕਦੇ ਹੋ! (You can do this!)",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let analogies = [
            (
                "photosynthesis",
                "ਪੌਧਾ ਸੂਰਜ ਤੋਂ ਊਰਜਾ ਲੈਂਦਾ ਹੈ ਜਿਵੇਂ ਸਾਡੇ ਸੋਲਰ ਪੈਨਲ ਲੈਂਦੇ ਹਨ",
            ),
            (
                "cell_division",
                "ਸੈੱਲ ਵੰਡਦੇ ਹਨ ਜਿਵੇਂ ਗਿੱਦੜ ਦੇ ਬੱਚੇ ਦੋ ਹੋ ਜਾਂਦੇ ਹਨ",
            ),
            (
                "water_cycle",
                "ਪਾਣੀ ਚੱਕਰ ਜਿਵੇਂ ਸਾਡੀ ਟਿਊਬਵੈੱਲ ਤੋਂ ਖੇਤਾਂ ਵਿੱਚ ਜਾਂਦਾ ਹੈ",
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            encouragement,
            analogies,
        }
    }
}

impl PhraseBook {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PhraseError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, PhraseError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Random encouragement, or a plain greeting when the pool is empty.
    pub fn encouragement(&self, rng: &mut dyn RngCore) -> &str {
        self.encouragement
            .choose(rng)
            .map(String::as_str)
            .unwrap_or(FALLBACK_PHRASE)
    }

    pub fn analogy(&self, topic: &str) -> Option<&str> {
        self.analogies.get(topic).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn empty_pool_falls_back_to_greeting() {
        let book = PhraseBook {
            encouragement: vec![],
            analogies: BTreeMap::new(),
        };
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(book.encouragement(&mut rng), "Hello!");
    }

    #[test]
    fn partial_yaml_keeps_default_analogies() {
        let book = PhraseBook::from_yaml_str("encouragement:\n  - Keep going!\n").unwrap();
        assert_eq!(book.encouragement, vec!["Keep going!".to_string()]);
        assert!(book.analogy("photosynthesis").is_some());
    }

    #[test]
    fn default_book_knows_water_cycle() {
        assert!(PhraseBook::default().analogy("water_cycle").is_some());
        assert!(PhraseBook::default().analogy("volcanoes").is_none());
    }
}
