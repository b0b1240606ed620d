//! Regulatory keyword lexicon
//!
//! The lexicon maps domain terms to an English gloss. Matches are rendered
//! as `"term (translation)"`. A term matches either as a case-insensitive
//! substring, which suits Norwegian compounds ("høringsfrist" contains
//! "frist"), or as a whole word for short terms that would otherwise hit
//! inside unrelated words.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One lexicon entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconTerm {
    pub term: String,
    pub translation: String,
    #[serde(default)]
    pub whole_word: bool,
}

impl LexiconTerm {
    pub fn new(term: &str, translation: &str) -> Self {
        Self {
            term: term.to_string(),
            translation: translation.to_string(),
            whole_word: false,
        }
    }

    pub fn word(term: &str, translation: &str) -> Self {
        Self {
            whole_word: true,
            ..Self::new(term, translation)
        }
    }
}

/// Lexicon as loaded from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub terms: Vec<LexiconTerm>,
    /// Terms that make any change significant on their own
    pub hard_triggers: Vec<String>,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        use LexiconTerm as T;

        let terms = vec![
            // Regulatory terms
            T::new("forskrift", "regulation"),
            T::word("lov", "law"),
            T::new("forordning", "ordinance"),
            T::new("vedtak", "decision"),
            T::new("endring", "change/amendment"),
            T::new("ikrafttredelse", "entry into force"),
            // Permits and licensing
            T::new("tillatelse", "permit"),
            T::new("konsesjon", "license"),
            T::new("søknad", "application"),
            T::new("godkjenning", "approval"),
            T::new("avslag", "rejection"),
            // Production and capacity
            T::word("mtb", "maximum biomass"),
            T::new("biomasse", "biomass"),
            T::new("produksjon", "production"),
            T::new("kapasitet", "capacity"),
            T::new("utsett", "stocking"),
            // Fish health
            T::new("lakselus", "sea lice"),
            T::new("sykdom", "disease"),
            T::new("smitte", "infection"),
            T::new("behandling", "treatment"),
            T::new("vaksine", "vaccine"),
            T::word("ila", "ISA (infectious salmon anemia)"),
            T::word("pd", "PD (pancreas disease)"),
            // Environment
            T::new("miljø", "environment"),
            T::new("utslipp", "emissions"),
            T::new("rømming", "escape"),
            T::new("bunnpåvirkning", "seabed impact"),
            T::new("trafikklys", "traffic light system"),
            // Enforcement
            T::new("gebyr", "fee"),
            T::word("bot", "fine"),
            T::new("overtredelse", "violation"),
            T::new("sanksjoner", "sanctions"),
            T::new("stenging", "closure"),
            T::new("forbud", "prohibition"),
            // Deadlines and consultation
            T::new("frist", "deadline"),
            T::new("høring", "consultation"),
            T::new("høringsfrist", "consultation deadline"),
            T::word("innen", "by/within"),
            // Production areas
            T::new("produksjonsområde", "production area"),
            T::new("rød sone", "red zone"),
            T::new("gul sone", "yellow zone"),
            T::new("grønn sone", "green zone"),
        ];

        Self {
            terms,
            hard_triggers: ["forskrift", "frist", "bot", "stenging"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
enum TermMatcher {
    Substring(String),
    Word(Regex),
}

impl TermMatcher {
    fn build(term: &str, whole_word: bool) -> Result<Self, regex::Error> {
        let lowered = term.to_lowercase();
        if whole_word {
            Regex::new(&format!(r"\b{}\b", regex::escape(&lowered))).map(Self::Word)
        } else {
            Ok(Self::Substring(lowered))
        }
    }

    /// `lowered` must already be lowercase
    fn is_match(&self, lowered: &str) -> bool {
        match self {
            Self::Substring(term) => lowered.contains(term.as_str()),
            Self::Word(re) => re.is_match(lowered),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    label: String,
    matcher: TermMatcher,
}

/// Compiled lexicon
#[derive(Debug, Clone)]
pub struct KeywordLexicon {
    entries: Vec<Entry>,
    hard_triggers: Vec<(String, TermMatcher)>,
}

impl KeywordLexicon {
    pub fn new(config: &LexiconConfig) -> Result<Self, regex::Error> {
        let entries = config
            .terms
            .iter()
            .map(|t| {
                Ok(Entry {
                    label: format!("{} ({})", t.term, t.translation),
                    matcher: TermMatcher::build(&t.term, t.whole_word)?,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        // A trigger inherits the match mode of the lexicon term it names
        let hard_triggers = config
            .hard_triggers
            .iter()
            .map(|trigger| {
                let whole_word = config
                    .terms
                    .iter()
                    .find(|t| t.term.eq_ignore_ascii_case(trigger))
                    .is_some_and(|t| t.whole_word);
                Ok((trigger.clone(), TermMatcher::build(trigger, whole_word)?))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            entries,
            hard_triggers,
        })
    }

    /// Labels of all terms occurring in `text`, in lexicon order
    pub fn scan(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.matcher.is_match(&lowered))
            .map(|e| e.label.clone())
            .collect()
    }

    /// Hard triggers occurring in `text`
    pub fn hard_trigger_hits(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.hard_triggers
            .iter()
            .filter(|(_, m)| m.is_match(&lowered))
            .map(|(t, _)| t.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for KeywordLexicon {
    fn default() -> Self {
        Self::new(&LexiconConfig::default()).expect("built-in lexicon compiles")
    }
}
