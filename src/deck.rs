use std::path::Path;

use crate::error::DeckError;
use crate::models::{Card, Difficulty};

const BUILTIN_CARDS: &str = include_str!("../data/cards.json");

/// An ordered card catalog. Order is preserved through every filter.
#[derive(Debug, Clone, Default)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    pub fn new(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// The sample deck compiled into the binary.
    ///
    /// Panics if the bundled file is malformed.
    pub fn builtin() -> Self {
        let cards = serde_json::from_str(BUILTIN_CARDS).expect("bundled card deck is valid JSON");
        Self { cards }
    }

    pub fn from_json(raw: &str, origin: &str) -> Result<Self, DeckError> {
        let cards = serde_json::from_str(raw).map_err(|source| DeckError::Parse {
            path: origin.to_string(),
            source,
        })?;
        Ok(Self { cards })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DeckError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| DeckError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let deck = Self::from_json(&raw, &path.display().to_string())?;
        log::debug!("Loaded {} cards from {}", deck.len(), path.display());
        Ok(deck)
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    /// Category names in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for card in &self.cards {
            if !seen.contains(&card.category.as_str()) {
                seen.push(&card.category);
            }
        }
        seen
    }

    /// Narrow by category, then by difficulty. `None` keeps everything.
    pub fn filter(&self, category: Option<&str>, difficulty: Option<Difficulty>) -> Vec<Card> {
        self.cards
            .iter()
            .filter(|c| category.map_or(true, |cat| c.category == cat))
            .filter(|c| difficulty.map_or(true, |d| c.difficulty == d))
            .cloned()
            .collect()
    }
}
