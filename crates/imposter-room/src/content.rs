//! Question content: the pairs rounds are built from.
//!
//! The room state machine treats content as opaque. It only needs an
//! ordered slice of pairs and compares them by their exact text.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::RoomError;

/// One round's worth of content.
///
/// Two pairs are the same pair when both strings match exactly; that is the
/// identity a room uses to avoid serving a pair twice. The file format
/// names the majority question `player`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionPair {
    /// The question everyone except the imposter answers.
    #[serde(rename = "player", alias = "majority")]
    pub majority: String,
    /// The look-alike question the imposter answers.
    pub imposter: String,
}

impl QuestionPair {
    pub fn new(majority: impl Into<String>, imposter: impl Into<String>) -> Self {
        Self {
            majority: majority.into(),
            imposter: imposter.into(),
        }
    }
}

/// Supplies the pairs a registry draws rounds from.
pub trait QuestionSource: Send + Sync + 'static {
    /// All available pairs. Order carries no meaning.
    fn pairs(&self) -> &[QuestionPair];
}

/// An in-memory list of question pairs.
#[derive(Debug, Clone)]
pub struct QuestionDeck {
    pairs: Vec<QuestionPair>,
}

impl QuestionDeck {
    /// Builds a deck from explicit pairs.
    pub fn new(pairs: Vec<QuestionPair>) -> Result<Self, RoomError> {
        if pairs.is_empty() {
            return Err(RoomError::EmptyDeck);
        }
        Ok(Self { pairs })
    }

    /// Loads a JSON array of `{ "player": ..., "imposter": ... }` objects.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RoomError> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|source| RoomError::ContentIo {
            path: path.to_path_buf(),
            source,
        })?;
        let pairs: Vec<QuestionPair> =
            serde_json::from_slice(&raw).map_err(RoomError::ContentFormat)?;
        tracing::info!(path = %path.display(), pairs = pairs.len(), "loaded question deck");
        Self::new(pairs)
    }

    /// The deck the game ships with.
    pub fn builtin() -> Self {
        let pairs = BUILTIN_PAIRS
            .iter()
            .map(|(majority, imposter)| QuestionPair::new(*majority, *imposter))
            .collect();
        Self { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl QuestionSource for QuestionDeck {
    fn pairs(&self) -> &[QuestionPair] {
        &self.pairs
    }
}

const BUILTIN_PAIRS: &[(&str, &str)] = &[
    (
        "On a scale from 1-100 how much do your parents love you?",
        "Pick a number from 1-100",
    ),
    (
        "What country has the most attractive people?",
        "What country has the best food in the world?",
    ),
    (
        "If you could be any height what height would you be?",
        "If you could choose your s/o's height what would it be?",
    ),
    (
        "What animal would you like to turn into?",
        "What animal is the tastiest?",
    ),
    (
        "What tv show would you show to your kids",
        "What is the show you watched the most recently?",
    ),
    ("Hours of work you do per week?", "Pick a number from 1-110"),
    (
        "How long do you stay in bed after you wake up?",
        "Give a time between 1 minute and 4 hours",
    ),
    (
        "What celeb do you want to be stuck on a deserted island with?",
        "Who is your least favourite celeb?",
    ),
    (
        "What is the most romantic thing you can say to someone?",
        "What is your fave movie quote?",
    ),
    (
        "What country would you most like to visit?",
        "What is the most dangerous country?",
    ),
    (
        "What is the best item to have during a zombie apocalypse?",
        "What is the worst gift to receive?",
    ),
    (
        "What is the best time of day to go to the gym?",
        "Best time to wake up on a chill weekend?",
    ),
    ("What is your go to karaoke song?", "Song that makes you cry?"),
    (
        "Who in the group do you secretly look up to?",
        "Who is most likely to go to jail in the group?",
    ),
    (
        "What is a good age to have your first kid?",
        "At what age did you have your first kiss?",
    ),
    ("What is your favourite superhero?", "Dream career?"),
    (
        "Where would you go if you could teleport anywhere?",
        "Your least favourite restaurant?",
    ),
    (
        "What fictional world would you most want to live in?",
        "What is the scariest movie?",
    ),
    (
        "What is your best physical feature?",
        "What is the grossest body part?",
    ),
    (
        "What is your favourite musical artist?",
        "Name the most overrated musical artist?",
    ),
    (
        "If you won the lottery what percent would you give to your parents?",
        "How much do you tip at a restaurant?",
    ),
    (
        "Pick the best ship in the group",
        "What two people in the group hang out the least?",
    ),
    (
        "What's your dream job if money didn't matter?",
        "What's the most boring job you can think of?",
    ),
    (
        "What is your favourite RG outfit?",
        "What would you wear on a night out?",
    ),
    (
        "What's the most expensive thing you've ever bought?",
        "What's something you refuse to spend money on?",
    ),
    ("What emoji do you use the most?", "What emoji do you hate?"),
    (
        "What's your biggest turn-on?",
        "What's something that turns you off immediately?",
    ),
    (
        "What's your most toxic trait in relationships?",
        "What's your biggest dating green flag?",
    ),
    (
        "Who's your celebrity crush",
        "Who's someone you'd never sleep with, even for a million dollars?",
    ),
    (
        "Who in the group would survive the longest in a horror movie?",
        "Who in the group would die first in a horror movie?",
    ),
    (
        "Who's the chillest person in the group?",
        "Who's the most dramatic person in the group?",
    ),
];
