/// Les 22 catégories de premier niveau du schéma Overture Places. Seules
/// valeurs de prédiction non vides admises.
pub const TOP_LEVEL_CATEGORIES: &[&str] = &[
    "accommodation",
    "active_life",
    "arts_and_entertainment",
    "attractions_and_activities",
    "automotive",
    "beauty_and_spa",
    "business_to_business",
    "eat_and_drink",
    "education",
    "financial_service",
    "health_and_medical",
    "home_service",
    "mass_media",
    "pets",
    "private_establishments_and_corporates",
    "professional_services",
    "public_service_and_government",
    "real_estate",
    "religious_organization",
    "retail",
    "structure_and_geography",
    "travel",
];

// Paire de catégories soeurs fréquemment confondues ; le prompt peut leur
// adjoindre une liste de sous-catégories chargée depuis un fichier annexe.
pub const AMBIGUOUS_CATEGORIES: &[&str] = &["arts_and_entertainment", "attractions_and_activities"];

pub fn is_top_level(label: &str) -> bool {
    TOP_LEVEL_CATEGORIES.contains(&label)
}

pub fn find_top_level(label: &str) -> Option<&'static str> {
    let needle = label.trim();
    TOP_LEVEL_CATEGORIES
        .iter()
        .copied()
        .find(|candidate| candidate.eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_is_fixed_and_sorted() {
        assert_eq!(TOP_LEVEL_CATEGORIES.len(), 22);
        let mut sorted = TOP_LEVEL_CATEGORIES.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, TOP_LEVEL_CATEGORIES);
    }

    #[test]
    fn find_top_level_ignores_case_and_spaces() {
        assert_eq!(find_top_level(" Retail "), Some("retail"));
        assert_eq!(find_top_level("EAT_AND_DRINK"), Some("eat_and_drink"));
        assert_eq!(find_top_level("banana"), None);
    }
}
