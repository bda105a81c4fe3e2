//! Community comment statistics.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wod_core::classifiers::rep_scheme_summary;
use wod_core::models::CanonicalRecord;

const TOP_POSTS: usize = 5;
const TOP_COMMENTERS: usize = 20;
const ANONYMOUS: &str = "Anonymous";

/// A comment as normalized by the source fetcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub post_id: Option<i64>,
    /// `YYYY-MM-DD`, possibly with a time suffix.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCount {
    /// `YYYY-MM`
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopPost {
    pub id: i64,
    pub date: String,
    pub title: String,
    pub link: String,
    pub comment_count: usize,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commenter {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentsAnalysis {
    pub generated_at: DateTime<Utc>,
    pub total_comments: usize,
    /// Every month from the first to the last commented month, zeros included.
    pub monthly: Vec<MonthCount>,
    pub top_posts: Vec<TopPost>,
    pub top_commenters: Vec<Commenter>,
}

/// Summarize comments against the canonical records.
///
/// Comments without a post id are ignored entirely.
pub fn analyze_comments(
    records: &[CanonicalRecord],
    comments: &[CommentRecord],
    generated_at: DateTime<Utc>,
) -> CommentsAnalysis {
    let posts_by_id: HashMap<i64, &CanonicalRecord> = records
        .iter()
        .filter_map(|r| r.id.map(|id| (id, r)))
        .collect();

    let mut months: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    let mut per_post: HashMap<i64, usize> = HashMap::new();
    let mut per_author: HashMap<String, usize> = HashMap::new();
    let mut total = 0usize;

    for comment in comments {
        let Some(post_id) = comment.post_id.filter(|id| *id != 0) else {
            continue;
        };
        total += 1;
        if let Some(key) = comment.date.as_deref().and_then(month_key) {
            *months.entry(key).or_default() += 1;
        }
        *per_post.entry(post_id).or_default() += 1;
        let author = comment
            .author_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(ANONYMOUS);
        *per_author.entry(author.to_string()).or_default() += 1;
    }

    let top_posts = ranked(per_post, TOP_POSTS)
        .into_iter()
        .map(|(id, count)| {
            let post = posts_by_id.get(&id);
            TopPost {
                id,
                date: post.map(|p| p.date.clone()).unwrap_or_default(),
                title: post
                    .map(|p| p.title.clone())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| format!("Post {id}")),
                link: post.map(|p| p.link.clone()).unwrap_or_default(),
                comment_count: count,
                summary: post
                    .map(|p| rep_scheme_summary(&p.components))
                    .unwrap_or_default(),
            }
        })
        .collect();

    let top_commenters = ranked(per_author, TOP_COMMENTERS)
        .into_iter()
        .map(|(name, count)| Commenter { name, count })
        .collect();

    CommentsAnalysis {
        generated_at,
        total_comments: total,
        monthly: month_series(&months),
        top_posts,
        top_commenters,
    }
}

/// `(-count, key)` order, truncated to `limit`.
fn ranked<K: Ord>(counts: HashMap<K, usize>, limit: usize) -> Vec<(K, usize)> {
    let mut rows: Vec<(K, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.truncate(limit);
    rows
}

fn month_key(date: &str) -> Option<(i32, u32)> {
    let year: i32 = date.get(..4)?.parse().ok()?;
    if date.get(4..5)? != "-" {
        return None;
    }
    let month: u32 = date.get(5..7)?.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

fn month_series(months: &BTreeMap<(i32, u32), usize>) -> Vec<MonthCount> {
    let (Some(&(mut y, mut m)), Some(&end)) = (months.keys().next(), months.keys().next_back())
    else {
        return Vec::new();
    };

    let mut series = Vec::new();
    while (y, m) <= end {
        series.push(MonthCount {
            month: format!("{y:04}-{m:02}"),
            count: months.get(&(y, m)).copied().unwrap_or(0),
        });
        m += 1;
        if m == 13 {
            y += 1;
            m = 1;
        }
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use wod_core::models::PostComponent;

    fn comment(id: i64, post_id: Option<i64>, date: &str, author: Option<&str>) -> CommentRecord {
        CommentRecord {
            id: Some(id),
            post_id,
            date: Some(date.to_string()),
            author_name: author.map(str::to_string),
        }
    }

    fn murph_record() -> CanonicalRecord {
        CanonicalRecord {
            id: Some(123),
            date: "2020-05-25".to_string(),
            title: "\"Murph\"".to_string(),
            link: "https://example.com/murph".to_string(),
            components: vec![PostComponent::new("Workout", "1 Mile Run\n100 Pull-Ups")],
            ..Default::default()
        }
    }

    #[test]
    fn test_analyze_comments_basic() {
        let comments = vec![
            comment(1, Some(123), "2020-05-25", Some("Alex")),
            comment(2, Some(123), "2020-06-01", Some("Alex")),
            comment(3, Some(123), "2020-06-02", Some("Sam")),
        ];
        let analysis = analyze_comments(&[murph_record()], &comments, Utc::now());

        assert_eq!(analysis.total_comments, 3);
        assert_eq!(analysis.top_posts[0].id, 123);
        assert_eq!(analysis.top_posts[0].comment_count, 3);
        assert_eq!(
            analysis.top_posts[0].summary,
            "Workout: 1 Mile Run | Workout: 100 Pull-Ups"
        );
        assert_eq!(analysis.top_commenters[0].name, "Alex");
        assert_eq!(analysis.top_commenters[0].count, 2);
        let months: Vec<_> = analysis.monthly.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2020-05", "2020-06"]);
    }

    #[test]
    fn test_month_series_fills_gaps_across_years() {
        let comments = vec![
            comment(1, Some(1), "2019-11-30", None),
            comment(2, Some(1), "2020-02-01", None),
        ];
        let analysis = analyze_comments(&[], &comments, Utc::now());
        let series: Vec<(&str, usize)> = analysis
            .monthly
            .iter()
            .map(|m| (m.month.as_str(), m.count))
            .collect();
        assert_eq!(
            series,
            vec![("2019-11", 1), ("2019-12", 0), ("2020-01", 0), ("2020-02", 1)]
        );
    }

    #[test]
    fn test_unknown_posts_and_anonymous_authors() {
        let comments = vec![
            comment(1, Some(77), "2021-01-01", Some("  ")),
            comment(2, Some(77), "2021-01-02", None),
            comment(3, None, "2021-01-03", Some("Ghost")),
        ];
        let analysis = analyze_comments(&[], &comments, Utc::now());
        assert_eq!(analysis.total_comments, 2);
        assert_eq!(analysis.top_posts[0].title, "Post 77");
        assert_eq!(analysis.top_posts[0].summary, "");
        assert_eq!(
            analysis.top_commenters,
            vec![Commenter {
                name: "Anonymous".to_string(),
                count: 2
            }]
        );
    }

    #[test]
    fn test_ranking_ties_broken_by_key() {
        let comments: Vec<CommentRecord> = (1..=8)
            .map(|i| comment(i, Some(i), "2021-01-01", Some("Zed")))
            .collect();
        let analysis = analyze_comments(&[], &comments, Utc::now());
        let ids: Vec<i64> = analysis.top_posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_month_key() {
        assert_eq!(month_key("2020-06-02T10:00:00"), Some((2020, 6)));
        assert_eq!(month_key("2020-13-01"), None);
        assert_eq!(month_key("06/02/2020"), None);
        assert_eq!(month_key(""), None);
    }
}
