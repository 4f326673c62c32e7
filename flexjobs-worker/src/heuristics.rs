/// Field cleanup and classification for scraped listings
///
/// Sources hand over loosely structured text. These helpers turn it into
/// the values a `jobs` row needs: a category name, a remote type, a
/// salary range and a short requirements summary.

use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;

use flexjobs_shared::models::job::RemoteType;

/// Longest text kept for any single field
pub const MAX_TEXT_CHARS: usize = 500;

/// Width of the `VARCHAR(255)` name columns (job title, company, location)
pub const MAX_NAME_CHARS: usize = 255;

pub const DEFAULT_CATEGORY: &str = "technology";

/// Checked in order; the first category with a keyword hit wins
const CATEGORY_KEYWORDS: [(&str, &[&str]); 9] = [
    (
        "technology",
        &[
            "software", "developer", "engineer", "programming", "coding", "tech", "it", "data",
            "ai", "machine learning", "devops", "frontend", "backend",
        ],
    ),
    (
        "customer service",
        &["customer", "support", "service", "success", "care", "help desk", "chat"],
    ),
    (
        "marketing",
        &["marketing", "social media", "content", "seo", "digital marketing", "brand", "campaign"],
    ),
    ("sales", &["sales", "business development", "account manager", "revenue"]),
    ("design", &["design", "ui", "ux", "graphic", "creative", "visual"]),
    ("finance", &["finance", "accounting", "financial", "bookkeeping", "controller"]),
    ("hr", &["hr", "human resources", "recruiting", "talent", "people operations"]),
    ("writing", &["writer", "content writer", "copywriter", "editor", "journalist"]),
    (
        "project management",
        &["project manager", "program manager", "scrum master", "product manager"],
    ),
];

const REQUIREMENT_PATTERNS: [&str; 4] = [
    r"\d+\+?\s*years?\s*(?:of\s*)?experience",
    r"bachelor'?s?\s*degree",
    r"master'?s?\s*degree",
    r"(?:proficient|experience)\s*in\s*[^.]+",
];

/// Trims, collapses whitespace and caps the length
pub fn clean_text(text: &str) -> String {
    clean_text_to(text, MAX_TEXT_CHARS)
}

/// [`clean_text`] for values stored in a name column
pub fn clean_name(text: &str) -> String {
    clean_text_to(text, MAX_NAME_CHARS)
}

fn clean_text_to(text: &str, max_chars: usize) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_chars)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Hybrid when the text says so, remote otherwise
pub fn determine_remote_type(location: &str, title: &str, description: &str) -> RemoteType {
    let text = format!("{} {} {}", location, title, description).to_lowercase();
    if text.contains("hybrid") || text.contains("part remote") {
        RemoteType::Hybrid
    } else {
        RemoteType::Remote
    }
}

/// Compiled patterns for the regex-based heuristics
pub struct Heuristics {
    categories: Vec<(&'static str, Regex)>,
    salary_number: Regex,
    requirements: Vec<Regex>,
}

impl Heuristics {
    pub fn new() -> Result<Self, regex::Error> {
        let categories = CATEGORY_KEYWORDS
            .iter()
            .map(|(name, keywords)| {
                let alternatives = keywords
                    .iter()
                    .map(|k| regex::escape(k))
                    .collect::<Vec<_>>()
                    .join("|");
                RegexBuilder::new(&format!(r"\b(?:{})\b", alternatives))
                    .case_insensitive(true)
                    .build()
                    .map(|re| (*name, re))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let requirements = REQUIREMENT_PATTERNS
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            categories,
            salary_number: Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*([kK])?")?,
            requirements,
        })
    }

    /// Lowercase category name for a listing
    pub fn determine_category(&self, title: &str, description: &str) -> &'static str {
        let text = format!("{} {}", title, description);
        self.categories
            .iter()
            .find(|(_, re)| re.is_match(&text))
            .map(|(name, _)| *name)
            .unwrap_or(DEFAULT_CATEGORY)
    }

    /// `(min, max)` from free-form salary text
    ///
    /// Two or more numbers give the smallest and largest; a single number
    /// is a minimum only. A `k` suffix multiplies by a thousand. Numbers
    /// too large for a `NUMERIC(12, 2)` column are dropped.
    pub fn parse_salary(&self, text: &str) -> (Option<Decimal>, Option<Decimal>) {
        let ceiling = Decimal::new(10_000_000_000, 0);

        let numbers: Vec<Decimal> = self
            .salary_number
            .captures_iter(text)
            .filter_map(|caps| {
                let digits = caps.get(1)?.as_str().replace(',', "");
                let value: Decimal = digits.parse().ok()?;
                if caps.get(2).is_some() {
                    value.checked_mul(Decimal::from(1000))
                } else {
                    Some(value)
                }
            })
            .filter(|value| *value < ceiling)
            .collect();

        match numbers.as_slice() {
            [] => (None, None),
            [only] => (Some(*only), None),
            many => (many.iter().min().copied(), many.iter().max().copied()),
        }
    }

    /// Experience and education phrases joined with `. `
    pub fn extract_requirements(&self, description: &str) -> Option<String> {
        let found: Vec<&str> = self
            .requirements
            .iter()
            .flat_map(|re| re.find_iter(description).map(|m| m.as_str().trim()))
            .collect();

        if found.is_empty() {
            None
        } else {
            Some(found.join(". "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Senior \n\t Engineer  "), "Senior Engineer");
        assert_eq!(clean_text(&"a".repeat(600)).chars().count(), MAX_TEXT_CHARS);
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_clean_name_fits_column() {
        let long = format!("Staff {}", "Engineer ".repeat(60));
        let name = clean_name(&long);
        assert!(name.chars().count() <= MAX_NAME_CHARS);
        assert!(name.starts_with("Staff Engineer"));
        assert!(!name.ends_with(' '));
        assert_eq!(clean_name("  Acme 
 Corp "), "Acme Corp");
    }

    #[test]
    fn test_remote_type() {
        assert_eq!(determine_remote_type("New York (Hybrid)", "Engineer", ""), RemoteType::Hybrid);
        assert_eq!(determine_remote_type("", "Engineer", "We are part remote"), RemoteType::Hybrid);
        assert_eq!(determine_remote_type("Worldwide", "Engineer", ""), RemoteType::Remote);
        assert_eq!(determine_remote_type("Berlin", "Engineer", "Office based"), RemoteType::Remote);
    }

    #[test]
    fn test_category_order_and_default() {
        let h = Heuristics::new().unwrap();

        assert_eq!(h.determine_category("Senior Backend Developer", ""), "technology");
        assert_eq!(h.determine_category("Customer Success Lead", "Help our users"), "customer service");
        assert_eq!(h.determine_category("SEO Specialist", ""), "marketing");
        assert_eq!(h.determine_category("Head of People", "People Operations"), "hr");
        assert_eq!(h.determine_category("Scrum Master", ""), "project management");
        assert_eq!(h.determine_category("Barista", "Pour coffee"), DEFAULT_CATEGORY);
    }

    #[test]
    fn test_category_matches_whole_words() {
        let h = Heuristics::new().unwrap();

        // "editor" must not fire on "accreditor", "ui" not on "guide"
        assert_eq!(h.determine_category("Accreditor", "Tour guide duties"), DEFAULT_CATEGORY);
        assert_eq!(h.determine_category("Copy Editor", ""), "writing");
    }

    #[test]
    fn test_parse_salary() {
        let h = Heuristics::new().unwrap();

        assert_eq!(h.parse_salary("$90,000 - $120,000"), (Some(dec(90_000)), Some(dec(120_000))));
        assert_eq!(h.parse_salary("$120k - $80k"), (Some(dec(80_000)), Some(dec(120_000))));
        assert_eq!(h.parse_salary("From 75000 per year"), (Some(dec(75_000)), None));
        assert_eq!(h.parse_salary("Competitive"), (None, None));
    }

    #[test]
    fn test_parse_salary_drops_oversized_numbers() {
        let h = Heuristics::new().unwrap();

        assert_eq!(h.parse_salary("up to 79228162514264337593543950335k"), (None, None));
        assert_eq!(h.parse_salary("99999999999999999999999999999999"), (None, None));
        assert_eq!(h.parse_salary("$50k - 12345678901234"), (Some(dec(50_000)), None));
        assert_eq!(h.parse_salary("9999999999"), (Some(dec(9_999_999_999)), None));
    }

    #[test]
    fn test_extract_requirements() {
        let h = Heuristics::new().unwrap();

        let text = "You have 5+ years of experience. A Bachelor's degree is a plus. Proficient in Rust and Go.";
        assert_eq!(
            h.extract_requirements(text).as_deref(),
            Some("5+ years of experience. Bachelor's degree. Proficient in Rust and Go")
        );
        assert_eq!(h.extract_requirements("Just be nice."), None);
    }
}
