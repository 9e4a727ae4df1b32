// ============================================================
// CHEMICAL NAMES AND CATEGORIES
// ============================================================
// Heuristics over free-text line descriptions from supplier reports

use once_cell::sync::Lazy;
use regex::Regex;

static CHEMICAL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)chemical\s*-\s*(.*?)(?:$|\s*-\s*)").unwrap());

const COMMON_CHEMICALS: &[&str] = &[
    "Sodium Hypochlorite",
    "Bleach",
    "Chlorine",
    "Caustic",
    "Sodium Hydroxide",
    "Lime",
    "Calcium Hydroxide",
    "Soda Ash",
    "Sodium Carbonate",
    "Ferric Chloride",
    "Alum",
    "Aluminum Sulfate",
    "Polymer",
    "Fluoride",
    "Activated Carbon",
    "PAC",
    "GAC",
    "Potassium Permanganate",
    "KMnO4",
    "Peracetic Acid",
    "Hydrogen Peroxide",
    "Acids",
    "Bases",
    "Muriatic Acid",
    "Sulfuric Acid",
    "Ammonia",
    "Sodium Bisulfite",
    "Citric Acid",
];

const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Disinfectant",
        &["chlorine", "bleach", "sodium hypochlorite", "hypochlorite", "cl2"],
    ),
    (
        "pH Adjustment",
        &["caustic", "sodium hydroxide", "lime", "soda ash", "sodium carbonate", "acid", "naoh"],
    ),
    (
        "Coagulant",
        &["ferric", "alum", "aluminum sulfate", "poly aluminum", "coagulant"],
    ),
    ("Polymer", &["polymer", "flocculant"]),
    (
        "Oxidant",
        &["permanganate", "kmno4", "hydrogen peroxide", "peracetic"],
    ),
    ("Adsorbent", &["carbon", "pac", "gac", "activated"]),
    (
        "Corrosion Control",
        &["phosphate", "zinc", "silicate", "inhibitor"],
    ),
];

pub const OTHER_CATEGORY: &str = "Other";

/// Pull a chemical name out of a line description.
///
/// Tries `Chemical - <name> - <grade>` first, then a list of common
/// treatment chemicals. Short descriptions are kept whole; longer ones are
/// cut to their first three words.
pub fn extract_chemical_name(description: &str) -> String {
    let description = description.trim();

    if let Some(name) = CHEMICAL_PREFIX
        .captures(description)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|name| !name.is_empty())
    {
        return name.to_string();
    }

    let lower = description.to_lowercase();
    if let Some(chemical) = COMMON_CHEMICALS
        .iter()
        .find(|c| lower.contains(&c.to_lowercase()))
    {
        return chemical.to_string();
    }

    let words: Vec<&str> = description.split_whitespace().collect();
    if words.len() <= 3 && description.chars().count() < 30 {
        return description.to_string();
    }

    format!("{}...", words[..3.min(words.len())].join(" "))
}

/// Map a chemical name to its treatment category, `Other` when nothing fits.
pub fn categorize_chemical(chemical: &str) -> &'static str {
    let lower = chemical.to_lowercase();
    CATEGORIES
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| lower.contains(p)))
        .map(|(category, _)| *category)
        .unwrap_or(OTHER_CATEGORY)
}

pub const CATALOG: &str = "Catalog";
pub const FREE_TEXT: &str = "Free Text";

const CATALOG_MARKERS: &[&str] = &["catalog", "cat#", "item#", "sku", "chemical -", "chemical-"];

/// `Catalog` when a line description carries catalog markers, else `Free Text`.
pub fn determine_po_type(description: &str) -> &'static str {
    let lower = description.to_lowercase();
    if CATALOG_MARKERS.iter().any(|m| lower.contains(m)) {
        CATALOG
    } else {
        FREE_TEXT
    }
}

/// Case variants of `Catalog` / `Free Text` collapse to one spelling; other values pass through.
pub fn standard_po_type(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return FREE_TEXT.to_string();
    }
    [CATALOG, FREE_TEXT]
        .into_iter()
        .find(|t| t.eq_ignore_ascii_case(trimmed))
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determine_po_type() {
        assert_eq!(determine_po_type("NEWBURG Chemical - Sodium Hypochlorite"), CATALOG);
        assert_eq!(determine_po_type("Alum SKU 4411"), CATALOG);
        assert_eq!(determine_po_type("caustic delivered to plant 2"), FREE_TEXT);
        assert_eq!(determine_po_type(""), FREE_TEXT);
    }

    #[test]
    fn test_standard_po_type() {
        assert_eq!(standard_po_type("CATALOG"), "Catalog");
        assert_eq!(standard_po_type(" free text "), "Free Text");
        assert_eq!(standard_po_type(""), "Free Text");
        assert_eq!(standard_po_type("Blanket"), "Blanket");
    }

    #[test]
    fn test_extract_from_chemical_prefix() {
        assert_eq!(
            extract_chemical_name("NEWBURG Chemical - Sodium Hypochlorite - 10-12.5%"),
            "Sodium Hypochlorite"
        );
    }

    #[test]
    fn test_extract_known_chemical() {
        assert_eq!(extract_chemical_name("50 lb bag of soda ash, delivered"), "Soda Ash");
    }

    #[test]
    fn test_extract_short_and_long_descriptions() {
        assert_eq!(extract_chemical_name("Defoamer"), "Defoamer");
        assert_eq!(
            extract_chemical_name("Monthly freight surcharge for tanker delivery"),
            "Monthly freight surcharge..."
        );
    }

    #[test]
    fn test_categorize() {
        assert_eq!(categorize_chemical("Sodium Hypochlorite"), "Disinfectant");
        assert_eq!(categorize_chemical("Caustic Soda"), "pH Adjustment");
        assert_eq!(categorize_chemical("Ferric Chloride"), "Coagulant");
        assert_eq!(categorize_chemical("Zinc Orthophosphate"), "Corrosion Control");
        assert_eq!(categorize_chemical("Defoamer"), OTHER_CATEGORY);
    }
}
