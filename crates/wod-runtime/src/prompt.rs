//! System prompts for the tagging and judge passes.

/// JSON shape every oracle reply must follow.
pub const RESPONSE_SCHEMA: &str = r#"{
  "id": number | null,
  "date": "YYYY-MM-DD" | null,
  "title": string,
  "link": string,
  "is_rest_day": boolean,
  "components": [{"component": string, "details": string}],
  "component_tags": string[],
  "format": string,
  "movements": string[],
  "unmapped_movements": string[],
  "notes": string
}"#;

const SHARED_RULES: &str = r#"Rest days:
- A title containing "Rest Day" means a rest day.
- Mentions such as "Yesterday's Whiteboard: Rest Day" in other sections do not count.
- Any prescription (AMRAP, EMOM, For Time, intervals, sets and reps) means it is NOT a rest day.

Ignore content that is not today's workout:
- Future schedules ("Tomorrow...", "Next week...", weekday schedule blocks).
- News, notes, recaps, newsletters, events, equipment announcements and unrelated articles.

Floater strength:
- A "FLOATER STRENGTH" section lists optional strength work. Capture it as a component and add the `floater_strength` tag.
- Movements that appear ONLY in the floater strength section must NOT be listed in `movements`, and must not decide `format`.

component_tags: only strength, conditioning, assistance, partner, floater_strength.

format: one of "amrap", "for time", "emom", "interval" (Tabata, intervals, "every 5:00" blocks), or "" when none applies.

movements:
- Use ONLY labels from the canonical list below. Anything you cannot map goes to `unmapped_movements`.
- "Row", "Rower", "Erg", "Cal Row", "Row 500m" map to `row (erg)`.
- "Power Snatch", "Hang Power Snatch", "Snatches" map to `snatch`.
- "Shoulder Press" maps to `strict press`.
- Tag `snatch` only when snatches are explicitly prescribed. Cleans of every kind (power, hang, squat, clean pull) are `clean`.
- When a movement is ambiguous, leave it out."#;

fn label_list(labels: &[String]) -> String {
    labels
        .iter()
        .map(|l| format!("- {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Instructions for the first-pass tagging of a single post.
pub fn tagging_prompt(labels: &[String]) -> String {
    format!(
        r#"You are auditing a workout parser for a gym's daily workout blog.

You receive ONE post as JSON (id, date, title, link, text). Decide whether it is a rest day, extract the programmed components (e.g. STRENGTH, METCON, ASSISTANCE, FLOATER STRENGTH), and tag movements, component tags and format.

If a workout is present without headings, use a single component named "Workout". Keep component details short: the prescription plus notes that change its meaning.

{SHARED_RULES}

Canonical movement labels:
{labels}

Return ONLY valid JSON matching this schema:
{RESPONSE_SCHEMA}

Prefer missing a movement over inventing one."#,
        labels = label_list(labels),
    )
}

/// Instructions for the reconciliation pass.
pub fn judge_prompt(labels: &[String]) -> String {
    format!(
        r#"You are the judge in an audit of workout tagging for a gym's daily workout blog.

You receive JSON with three fields: "post" (the post metadata and text), "regex_result" (the rule-based baseline) and "llm_result" (a first-pass candidate). Read the post and decide the correct tags. Use both results as references without trusting either, and return the corrected result in the same schema.

{SHARED_RULES}

Canonical movement labels:
{labels}

Return ONLY valid JSON matching this schema:
{RESPONSE_SCHEMA}

In `notes`, justify each correction you made in one to three sentences."#,
        labels = label_list(labels),
    )
}
