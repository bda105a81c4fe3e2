//! Curated phrase and name lists.
//!
//! These are built once at start-up and handed to the normalizer and the
//! named-workout matcher by reference; nothing mutates them afterwards.

// ── TextRules ─────────────────────────────────────────────────────────────────

/// Phrase lists that drive the text normalizer.
#[derive(Debug, Clone)]
pub struct TextRules {
    /// Heading fragments that mark a component as non-workout content.
    pub ignored_headings: Vec<String>,
    /// Line fragments that refer to future or scheduled content.
    pub future_markers: Vec<String>,
    /// Line fragments after which the rest of a component is promotional.
    pub promo_markers: Vec<String>,
    /// Heading keywords that mark a component as workout programming.
    pub workout_heading_keywords: Vec<String>,
}

impl Default for TextRules {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TextRules {
    /// The lists tuned against the blog's archive.
    pub fn builtin() -> Self {
        Self {
            ignored_headings: strings(&[
                "training cycle",
                "upcoming",
                "schedule",
                "news",
                "notes",
                "recap",
                "tomorrow",
                "monday",
                "tuesday",
                "wednesday",
                "thursday",
                "friday",
                "saturday",
                "sunday",
            ]),
            future_markers: strings(&[
                "tomorrow",
                "next week",
                "next day",
                "next cycle",
                "tomorrows",
                "training cycle",
                "our new cycle starts",
                "monday:",
                "tuesday:",
                "wednesday:",
                "thursday:",
                "friday:",
                "saturday:",
                "sunday:",
            ]),
            promo_markers: strings(&[
                "pull for pride",
                "east coast gambit",
                "iron maidens",
                "registration will open",
                "next level weightlifting",
                "subway series",
                "our new cycle starts",
                "training cycle dates",
                "goals:",
            ]),
            workout_heading_keywords: strings(&[
                "wod",
                "workout",
                "metcon",
                "conditioning",
                "cash out",
                "buy in",
                "cash-out",
                "cashout",
            ]),
        }
    }
}

// ── BenchmarkNames ────────────────────────────────────────────────────────────

/// Names of the benchmark workouts tracked by the named-workout matcher.
#[derive(Debug, Clone)]
pub struct BenchmarkNames {
    pub heroes: Vec<String>,
    pub girls: Vec<String>,
    /// Heading fragments marking administrative sections that never name a workout.
    pub administrative_headings: Vec<String>,
}

impl Default for BenchmarkNames {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BenchmarkNames {
    pub fn builtin() -> Self {
        Self {
            heroes: strings(&[
                "murph", "dt", "chad", "holleyman", "badger", "nate", "randy", "griff",
                "hidalgo", "jerry", "bull", "glen", "josh", "michael", "whitten", "jt",
                "lumberjack 20", "victoria", "mcghee", "abbate", "white", "kalsu", "manion",
                "morrison", "tommy v", "coe", "wittman", "mccluskey", "nick", "small", "roy",
                "gator", "garrett", "carse", "riley", "danny", "lorenza", "zeitoun", "murphy",
                "ship", "hansel", "jared", "peggy", "rhodesian", "tk", "tyler", "wood", "ryan",
                "camelot", "helm", "brenton",
            ]),
            girls: strings(&[
                "angie", "barbara", "chelsea", "diane", "elizabeth", "fran", "helen", "isabel",
                "jackie", "karen", "linda", "mary", "nancy", "annie", "christine", "eva",
                "gwen", "hope", "nicole", "cindy", "kelly", "lynne", "amanda", "maggie", "lila",
                "ingrid", "lyla", "grace", "tiff", "vera", "ariane",
            ]),
            administrative_headings: strings(&[
                "training cycle",
                "upcoming",
                "schedule",
                "news",
                "notes",
                "recap",
                "tomorrow",
            ]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lists_are_lowercase() {
        let rules = TextRules::builtin();
        let names = BenchmarkNames::builtin();
        for s in rules
            .ignored_headings
            .iter()
            .chain(&rules.future_markers)
            .chain(&rules.promo_markers)
            .chain(&names.heroes)
            .chain(&names.girls)
        {
            assert_eq!(s, &s.to_lowercase(), "{s} must be lowercase");
        }
    }

    #[test]
    fn test_builtin_names_include_benchmarks() {
        let names = BenchmarkNames::builtin();
        assert!(names.heroes.iter().any(|n| n == "murph"));
        assert!(names.heroes.iter().any(|n| n == "lumberjack 20"));
        assert!(names.girls.iter().any(|n| n == "grace"));
        assert_eq!(names.girls.len(), 31);
    }
}
