//! Regex-based entity extraction over document text.
//!
//! Targets citizenship-relevant structure: dates, passport/national-id
//! numbers, nationalities, person names, Norwegian addresses, citizenship
//! keywords, and language/residency signals. Dictionaries are curated
//! (English + Norwegian) and can be overridden from a versioned JSON file
//! via `NLP_MODEL_PATH`.

use regex::Regex;
use serde::Deserialize;
use shared_types::ExtractedFields;
use std::sync::LazyLock;

// ── Pattern definitions ─────────────────────────────────────────────

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // DD.MM.YYYY, DD/MM/YYYY, DD-MM-YYYY
        Regex::new(r"\b(\d{1,2}[./\-]\d{1,2}[./\-]\d{4})\b").unwrap(),
        // YYYY-MM-DD and variants
        Regex::new(r"\b(\d{4}[.\-/]\d{1,2}[.\-/]\d{1,2})\b").unwrap(),
        // English month names
        Regex::new(
            r"(?i)\b(\d{1,2}\s+(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:tember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\s+\d{4})\b",
        )
        .unwrap(),
        // Norwegian month names
        Regex::new(
            r"(?i)\b(\d{1,2}\s+(?:januar|februar|mars|april|mai|juni|juli|august|september|oktober|november|desember)\s+\d{4})\b",
        )
        .unwrap(),
    ]
});

static PASSPORT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // Up to two letters then 6-9 digits, e.g. NO1234567
        Regex::new(r"(?i)\b([A-Z]{0,2}\d{6,9})\b").unwrap(),
        // 11-digit Norwegian national id (fødselsnummer)
        Regex::new(r"\b(\d{11})\b").unwrap(),
    ]
});

static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?im)^.*?(?:full\s+)?name\s*:\s*(.+)$").unwrap(),
        Regex::new(r"(?im)^.*?(?:fullt\s+)?navn\s*:\s*(.+)$").unwrap(),
        Regex::new(r"(?im)^.*?(?:surname|etternavn)\s*:\s*(.+)$").unwrap(),
        Regex::new(r"(?im)^.*?(?:given\s+name|fornavn)\s*:\s*(.+)$").unwrap(),
    ]
});

/// Title-case pairs like "Ola Nordmann"; a coarse PER heuristic.
static TITLE_CASE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-ZÆØÅ][a-zæøå]+\s+[A-ZÆØÅ][a-zæøå]+)\b").unwrap()
});

static POSTAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // Norwegian postal format: 0001 Oslo
    Regex::new(r"\b(\d{4})\s+([A-ZÆØÅ][a-zæøå]+(?:\s+[A-ZÆØÅ][a-zæøå]+)*)\b").unwrap()
});

static STREET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // Storgata 12, Kirkeveien 4
    Regex::new(r"\b([A-ZÆØÅ][a-zæøå]+(?:gata|gaten|veien|vegen|gate|vei|veg)\s+\d+)").unwrap()
});

static DURATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2}\s+(?:years?|år))\b").unwrap());

// ── Dictionaries ────────────────────────────────────────────────────

/// Curated token dictionaries, English + Norwegian.
#[derive(Debug, Clone, Deserialize)]
pub struct Dictionaries {
    pub nationalities: Vec<String>,
    pub citizenship_keywords: Vec<String>,
    pub language_indicators: Vec<String>,
    pub residency_indicators: Vec<String>,
}

impl Default for Dictionaries {
    fn default() -> Self {
        Self {
            nationalities: to_strings(&[
                "norwegian", "norsk", "swedish", "svensk", "danish", "dansk",
                "finnish", "finsk", "icelandic", "islandsk", "german", "tysk",
                "french", "fransk", "british", "britisk", "american", "amerikansk",
                "polish", "polsk", "lithuanian", "litauisk", "somali", "somalisk",
                "eritrean", "eritreisk", "syrian", "syrisk", "iraqi", "irakisk",
                "afghan", "afghansk", "iranian", "iransk", "pakistani", "pakistansk",
                "indian", "indisk", "filipino", "filippinsk", "thai", "thailandsk",
                "russian", "russisk", "ukrainian", "ukrainsk", "turkish", "tyrkisk",
                "ethiopian", "etiopisk", "colombian", "colombiansk", "spanish",
                "spansk", "portuguese", "portugisisk", "chinese", "kinesisk",
                "vietnamese", "vietnamesisk", "dutch", "nederlandsk", "stateless",
                "statsløs",
            ]),
            citizenship_keywords: to_strings(&[
                // English
                "citizenship", "nationality", "naturalization", "permanent residence",
                "residence permit", "work permit", "visa", "refugee", "asylum",
                "police clearance", "criminal record", "background check",
                "integration", "language test", "social studies", "application",
                "applicant", "passport", "identity", "birth certificate",
                "marriage certificate",
                // Norwegian
                "statsborgerskap", "nasjonalitet", "innvilgelse", "søknad",
                "oppholdstillatelse", "permanent opphold", "arbeidstillatelse",
                "visum", "flyktning", "asyl", "politiattest", "vandelsattest",
                "integrering", "norskprøve", "samfunnskunnskap", "gebyr", "søker",
                "pass", "identitet", "fødselsattest", "vigselsattest",
                "utlendingsdirektoratet", "udi", "bosettingstillatelse",
            ]),
            language_indicators: to_strings(&[
                "norskprøve", "norwegian test", "language certificate", "muntlig",
                "skriftlig", "oral exam", "written exam", "a1", "a2", "b1", "b2",
                "c1", "c2", "bestått", "godkjent", "samfunnskunnskap",
                "social studies", "civic integration", "norskkurs",
                "norwegian course", "language course", "kompetanse norge",
                "folkeuniversitetet",
            ]),
            residency_indicators: to_strings(&[
                "years of residence", "years in norway", "år i norge", "botid",
                "permanent residence", "permanent opphold", "settled status",
                "continuous residence", "sammenhengende opphold",
                "registered address", "folkeregistrert", "d-number", "d-nummer",
                "national id", "fødselsnummer",
            ]),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Dictionaries {
    /// Load dictionary overrides from a JSON file. Missing file or parse
    /// errors fall back to the embedded defaults with a warning.
    pub fn from_path_or_default(path: Option<&str>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("failed to parse NLP dictionary {path}: {e}, using defaults");
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("failed to read NLP dictionary {path}: {e}, using defaults");
                Self::default()
            }
        }
    }
}

// ── Extraction ──────────────────────────────────────────────────────

/// Extract the typed entity bag from document text.
pub fn extract_entities(text: &str, dicts: &Dictionaries) -> ExtractedFields {
    let mut fields = ExtractedFields::default();
    if text.trim().is_empty() {
        return fields;
    }

    let text_lower = text.to_lowercase();

    for pattern in DATE_PATTERNS.iter() {
        for cap in pattern.captures_iter(text) {
            fields.dates.push(cap[1].to_string());
        }
    }
    fields.dates = dedupe(fields.dates);

    for pattern in PASSPORT_PATTERNS.iter() {
        for cap in pattern.captures_iter(text) {
            fields.identifiers.passport.push(cap[1].to_uppercase());
        }
    }
    fields.identifiers.passport = dedupe(fields.identifiers.passport);

    for nationality in &dicts.nationalities {
        if text_lower.contains(&nationality.to_lowercase()) {
            fields.nationalities.push(nationality.clone());
        }
    }
    fields.nationalities = dedupe(fields.nationalities);

    for keyword in &dicts.citizenship_keywords {
        if text_lower.contains(&keyword.to_lowercase()) {
            fields.keywords.citizenship.push(keyword.clone());
        }
    }
    fields.keywords.citizenship = dedupe(fields.keywords.citizenship);

    for indicator in &dicts.language_indicators {
        if text_lower.contains(&indicator.to_lowercase()) {
            fields.signals.language.push(indicator.clone());
        }
    }
    fields.signals.language = dedupe(fields.signals.language);

    for indicator in &dicts.residency_indicators {
        if text_lower.contains(&indicator.to_lowercase()) {
            fields.signals.residency.push(indicator.clone());
        }
    }
    for cap in DURATION_PATTERN.captures_iter(text) {
        fields.signals.residency.push(cap[1].to_string());
    }
    fields.signals.residency = dedupe(fields.signals.residency);

    for pattern in NAME_PATTERNS.iter() {
        for cap in pattern.captures_iter(text) {
            let name = cap[1].trim();
            if !name.is_empty() {
                fields.persons.push(name.to_string());
            }
        }
    }
    for cap in TITLE_CASE_NAME.captures_iter(text) {
        fields.persons.push(cap[1].to_string());
    }
    fields.persons = dedupe(fields.persons);

    for cap in POSTAL_PATTERN.captures_iter(text) {
        fields.locations.push(format!("{} {}", &cap[1], &cap[2]));
    }
    for cap in STREET_PATTERN.captures_iter(text) {
        fields.locations.push(cap[1].to_string());
    }
    fields.locations = dedupe(fields.locations);

    fields.compute_richness();
    fields
}

/// Remove duplicates case-insensitively while preserving order.
fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();
    for item in items {
        let trimmed = item.trim().to_string();
        let normalized = trimmed.to_lowercase();
        if !trimmed.is_empty() && seen.insert(normalized) {
            result.push(trimmed);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> ExtractedFields {
        extract_entities(text, &Dictionaries::default())
    }

    #[test]
    fn empty_text_yields_empty_bag() {
        let fields = extract("");
        assert!(fields.is_empty());
        assert_eq!(fields.entity_richness, 0.0);
    }

    #[test]
    fn dates_in_numeric_and_named_forms() {
        let fields = extract("Issued 12.03.2019, expires 2029-03-12, born 4 mars 1985, moved 1 May 2010");
        assert!(fields.dates.iter().any(|d| d == "12.03.2019"));
        assert!(fields.dates.iter().any(|d| d == "2029-03-12"));
        assert!(fields.dates.iter().any(|d| d == "4 mars 1985"));
        assert!(fields.dates.iter().any(|d| d == "1 May 2010"));
    }

    #[test]
    fn passport_numbers_uppercased_and_deduped() {
        let fields = extract("Passport no1234567 and again NO1234567, national id 01020312345");
        assert_eq!(
            fields.identifiers.passport,
            vec!["NO1234567".to_string(), "01020312345".to_string()]
        );
    }

    #[test]
    fn nationalities_from_both_languages() {
        let fields = extract("Applicant is Filipino, tidligere registrert som filippinsk borger");
        assert!(fields.nationalities.iter().any(|n| n == "filipino"));
        assert!(fields.nationalities.iter().any(|n| n == "filippinsk"));
    }

    #[test]
    fn nationality_dictionary_is_curated_and_large() {
        let dicts = Dictionaries::default();
        assert!(dicts.nationalities.len() >= 50);
    }

    #[test]
    fn citizenship_keywords_found() {
        let fields = extract("Søknad om statsborgerskap including permanent residence evidence");
        assert!(fields.keywords.citizenship.iter().any(|k| k == "statsborgerskap"));
        assert!(fields
            .keywords
            .citizenship
            .iter()
            .any(|k| k == "permanent residence"));
    }

    #[test]
    fn language_and_residency_signals() {
        let fields = extract("Norskprøve B1 bestått. Botid: 7 years in Norway, folkeregistrert.");
        assert!(fields.signals.language.iter().any(|s| s == "norskprøve"));
        assert!(fields.signals.language.iter().any(|s| s == "b1"));
        assert!(fields.signals.language.iter().any(|s| s == "bestått"));
        assert!(fields.signals.residency.iter().any(|s| s == "botid"));
        assert!(fields.signals.residency.iter().any(|s| s == "folkeregistrert"));
        assert!(fields.signals.residency.iter().any(|s| s == "7 years"));
    }

    #[test]
    fn persons_from_labels_and_title_case() {
        let fields = extract("Name: Ola Nordmann\nWitness was Kari Hansen yesterday");
        assert!(fields.persons.iter().any(|p| p == "Ola Nordmann"));
        assert!(fields.persons.iter().any(|p| p == "Kari Hansen"));
    }

    #[test]
    fn locations_from_postal_and_street_patterns() {
        let fields = extract("Registered at Storgata 12, 0155 Oslo since 2019");
        assert!(fields.locations.iter().any(|l| l == "Storgata 12"));
        assert!(fields.locations.iter().any(|l| l == "0155 Oslo"));
    }

    #[test]
    fn richness_reflects_distinct_entities() {
        let fields = extract("Passport NO1234567 issued 12.03.2019 to Name: Ola Nordmann, norwegian citizen");
        let n = fields.distinct_entity_count();
        assert!(n >= 4);
        assert!((fields.entity_richness - (n as f64 / 20.0).min(1.0)).abs() < 1e-9);
    }

    #[test]
    fn dedupe_is_case_insensitive_order_preserving() {
        let out = dedupe(vec![
            "Botid".to_string(),
            "botid".to_string(),
            " visa ".to_string(),
            "Visa".to_string(),
        ]);
        assert_eq!(out, vec!["Botid".to_string(), "visa".to_string()]);
    }

    #[test]
    fn extraction_is_deterministic() {
        let text = "Passport NO1234567, Name: Ola Nordmann, botid 7 år, 0155 Oslo";
        assert_eq!(extract(text), extract(text));
    }

    #[test]
    fn missing_dictionary_file_falls_back_to_defaults() {
        let dicts = Dictionaries::from_path_or_default(Some("/nonexistent/dict.json"));
        assert!(dicts.nationalities.len() >= 50);
    }
}
