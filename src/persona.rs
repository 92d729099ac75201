use serde::Deserialize;

use crate::error::ChatError;

pub const DEFAULT_PERSONA: &str = "Order a Pizza ChatBot";

const ORDERBOT_PROMPT: &str = include_str!("prompts/orderbot.txt");
const PLAIN_PROMPT: &str = "You are a helpful assistant. Answer briefly and in a friendly tone.";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Persona {
    pub name: String,
    pub prompt: String,
}

impl Persona {
    fn builtin(name: &str, prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            prompt: prompt.trim().to_string(),
        }
    }
}

/// Named system prompts, built-ins first, then user presets from config.
/// A user preset with a built-in's name replaces it in place.
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    presets: Vec<Persona>,
}

impl PersonaCatalog {
    pub fn builtin() -> Self {
        Self {
            presets: vec![
                Persona::builtin(DEFAULT_PERSONA, ORDERBOT_PROMPT),
                Persona::builtin("Plain Assistant", PLAIN_PROMPT),
            ],
        }
    }

    pub fn with_presets(mut self, extra: &[Persona]) -> Self {
        for preset in extra {
            match self
                .presets
                .iter_mut()
                .find(|p| p.name.eq_ignore_ascii_case(&preset.name))
            {
                Some(existing) => existing.prompt = preset.prompt.clone(),
                None => self.presets.push(preset.clone()),
            }
        }
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|p| p.name.as_str())
    }

    pub fn get(&self, name: &str) -> Result<&Persona, ChatError> {
        self.presets
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                let known = self.names().collect::<Vec<_>>().join(", ");
                ChatError::configuration(format!("unknown persona '{name}' (known: {known})"))
            })
    }
}

impl Default for PersonaCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
