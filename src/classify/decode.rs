use serde_json::Value;

use crate::domain::{find_top_level, TOP_LEVEL_CATEGORIES};

/// Issue du décodage d'une réponse : un membre de la taxonomie fixe, ou
/// rien. Le repli final est la prédiction vide, jamais une erreur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedLabel {
    Matched(&'static str),
    NoMatch,
}

impl DecodedLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodedLabel::Matched(label) => label,
            DecodedLabel::NoMatch => "",
        }
    }
}

/// Premier étage : extraction JSON stricte du champ `top_level_category`.
/// Seule une valeur membre de la taxonomie est acceptée.
pub fn decode_json_field(raw: &str) -> Option<&'static str> {
    let value: Value = serde_json::from_str(raw.trim()).ok()?;
    let field = value.get("top_level_category")?.as_str()?;
    find_top_level(field)
}

/// Second étage : recherche de sous-chaîne insensible à la casse, dans
/// l'ordre de la taxonomie.
pub fn decode_substring(raw: &str) -> Option<&'static str> {
    let haystack = raw.to_lowercase();
    TOP_LEVEL_CATEGORIES
        .iter()
        .copied()
        .find(|category| haystack.contains(category))
}

pub fn decode_label(raw: &str) -> DecodedLabel {
    if let Some(label) = decode_json_field(raw) {
        return DecodedLabel::Matched(label);
    }
    if let Some(label) = decode_substring(raw) {
        return DecodedLabel::Matched(label);
    }
    DecodedLabel::NoMatch
}
