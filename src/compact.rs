//! Digest compaction: fold the staging pen into per-source digests.
//!
//! Runs strictly after every fetch job has finished. Records are grouped
//! by source (digests come out in ascending source id) and each group is
//! partitioned into sections with a two-tier layout:
//!
//! - configured body categories, ascending by category id
//! - the designated trailing category, always last
//!
//! A record whose category the directory does not know is folded into
//! the nearest body section present in its group rather than dropped;
//! when the group has no body section at all the stray category stands
//! as its own. Staging read order is never re-sorted, so a deterministic
//! store read gives a deterministic digest.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::CategoryConfig;
use crate::error::PipelineError;
use crate::models::{ArticleRecord, Digest, Section, Source};

/// Fold staged records into one digest per source.
///
/// Records staged under a source id the run does not know are stale
/// (the source list changed since they were written); they are dropped
/// with a warning. A source whose display name no longer resolves skips
/// its group the same way. A source with no surviving records produces
/// no digest.
///
/// # Arguments
///
/// * `records` - staged records in store read order
/// * `sources` - the run's configured sources
/// * `categories` - the category directory used for section layout
/// * `trailing_category_id` - category rendered as the final section
/// * `content_date` - the date the articles were published
/// * `run_date` - the day the pipeline is running, shown on the masthead
pub fn compact(
    records: Vec<ArticleRecord>,
    sources: &[Source],
    categories: &[CategoryConfig],
    trailing_category_id: i64,
    content_date: NaiveDate,
    run_date: NaiveDate,
) -> Vec<Digest> {
    let directory: BTreeMap<i64, &Source> = sources.iter().map(|s| (s.id, s)).collect();

    let mut groups: BTreeMap<i64, Vec<ArticleRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.source_id).or_default().push(record);
    }

    let mut digests = Vec::new();
    for (source_id, group) in groups {
        let Some(source) = directory.get(&source_id) else {
            warn!(
                source_id,
                count = group.len(),
                "Dropping staged records for a source the run does not know"
            );
            continue;
        };
        let title = source.display_name.trim();
        if title.is_empty() {
            warn!(
                error = %PipelineError::SourceNameUnresolved(source_id),
                "Skipping digest group"
            );
            continue;
        }
        let sections = partition_sections(group, categories, trailing_category_id);
        info!(
            source = title,
            sections = sections.len(),
            "Compacted digest"
        );
        digests.push(Digest {
            source_id,
            title: title.to_string(),
            language: source.language.clone(),
            run_date,
            content_date,
            sections,
        });
    }
    info!(digests = digests.len(), "Compaction complete");
    digests
}

/// Partition one source's records into ordered sections.
///
/// Pure and deterministic: the same records in the same order always
/// yield the same sections. Section order is configured body categories
/// ascending, then the trailing category; within a section the input
/// order is preserved.
pub fn partition_sections(
    records: Vec<ArticleRecord>,
    categories: &[CategoryConfig],
    trailing_category_id: i64,
) -> Vec<Section> {
    let body_ids: Vec<i64> = categories
        .iter()
        .map(|c| c.id)
        .filter(|id| *id != trailing_category_id)
        .collect();
    // Body sections actually present in this group; stray categories can
    // only merge into one of these.
    let present: Vec<i64> = body_ids
        .iter()
        .copied()
        .filter(|id| records.iter().any(|r| r.category_id == *id))
        .collect();

    let mut body: BTreeMap<i64, Vec<ArticleRecord>> = BTreeMap::new();
    let mut trailing: Vec<ArticleRecord> = Vec::new();

    for record in records {
        let id = record.category_id;
        if id == trailing_category_id {
            trailing.push(record);
        } else if body_ids.contains(&id) {
            body.entry(id).or_default().push(record);
        } else if let Some(nearest) = nearest_category(id, &present) {
            body.entry(nearest).or_default().push(record);
        } else {
            body.entry(id).or_default().push(record);
        }
    }

    let mut sections: Vec<Section> = body
        .into_iter()
        .map(|(category_id, articles)| Section {
            category_id,
            heading: heading_for(category_id, categories),
            articles,
        })
        .collect();
    if !trailing.is_empty() {
        sections.push(Section {
            category_id: trailing_category_id,
            heading: heading_for(trailing_category_id, categories),
            articles: trailing,
        });
    }
    sections
}

/// Nearest id by absolute distance, ties toward the lower id.
fn nearest_category(id: i64, present: &[i64]) -> Option<i64> {
    present
        .iter()
        .copied()
        .min_by_key(|candidate| (candidate.abs_diff(id), *candidate))
}

fn heading_for(id: i64, categories: &[CategoryConfig]) -> String {
    categories
        .iter()
        .find(|c| c.id == id)
        .map(|c| c.heading.clone())
        .unwrap_or_else(|| format!("Category {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(source_id: i64, category_id: i64, title: &str) -> ArticleRecord {
        ArticleRecord {
            source_id,
            category_id,
            title: format!(" {title}"),
            body: " Body text.".to_string(),
            lead_image_url: None,
            staged_at: Utc::now(),
        }
    }

    fn source(id: i64, name: &str) -> Source {
        Source {
            id,
            display_name: name.to_string(),
            site_url: "https://example.com".to_string(),
            feed_url: None,
            country: "HR".to_string(),
            language: "hr".to_string(),
            default_category_id: Some(1),
            image: None,
        }
    }

    fn category(id: i64, heading: &str) -> CategoryConfig {
        CategoryConfig {
            id,
            heading: heading.to_string(),
        }
    }

    fn directory() -> Vec<CategoryConfig> {
        vec![
            category(1, "News"),
            category(2, "Business"),
            category(5, "Sport"),
        ]
    }

    fn content_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 24).unwrap()
    }

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 25).unwrap()
    }

    fn titles(section: &Section) -> Vec<&str> {
        section.articles.iter().map(|a| a.title.as_str()).collect()
    }

    #[test]
    fn test_two_tier_layout() {
        let records = vec![
            record(1, 5, "Match report"),
            record(1, 1, "Morning brief"),
            record(1, 1, "Evening brief"),
            record(1, 5, "Transfer news"),
        ];
        let sections = partition_sections(records, &directory(), 5);

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].category_id, 1);
        assert_eq!(sections[0].heading, "News");
        assert_eq!(titles(&sections[0]), vec![" Morning brief", " Evening brief"]);
        assert_eq!(sections[1].category_id, 5);
        assert_eq!(sections[1].heading, "Sport");
        assert_eq!(titles(&sections[1]), vec![" Match report", " Transfer news"]);
    }

    #[test]
    fn test_body_sections_ascend_by_category() {
        let records = vec![record(1, 2, "Markets"), record(1, 1, "Front page")];
        let sections = partition_sections(records, &directory(), 5);

        let ids: Vec<i64> = sections.iter().map(|s| s.category_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_unknown_category_merges_into_nearest() {
        let records = vec![
            record(1, 1, "Front page"),
            record(1, 3, "Tech notes"),
            record(1, 2, "Markets"),
        ];
        let sections = partition_sections(records, &directory(), 5);

        // Category 3 sits closer to 2 than to 1.
        assert_eq!(sections.len(), 2);
        assert_eq!(titles(&sections[1]), vec![" Tech notes", " Markets"]);
    }

    #[test]
    fn test_unknown_category_tie_prefers_lower_id() {
        let categories = vec![category(1, "News"), category(3, "Culture"), category(5, "Sport")];
        let records = vec![
            record(1, 1, "Front page"),
            record(1, 3, "Stage review"),
            record(1, 2, "Between the stools"),
        ];
        let sections = partition_sections(records, &categories, 5);

        assert_eq!(sections.len(), 2);
        assert_eq!(titles(&sections[0]), vec![" Front page", " Between the stools"]);
        assert_eq!(titles(&sections[1]), vec![" Stage review"]);
    }

    #[test]
    fn test_unknown_category_at_id_extremes_merges_nearest() {
        let records = vec![
            record(1, 1, "Front page"),
            record(1, i64::MIN, "Deep stray"),
            record(1, i64::MAX, "High stray"),
        ];
        let sections = partition_sections(records, &directory(), 5);

        // Distance must stay measurable at the ends of the id range.
        assert_eq!(sections.len(), 1);
        assert_eq!(
            titles(&sections[0]),
            vec![" Front page", " Deep stray", " High stray"]
        );
    }

    #[test]
    fn test_unknown_category_stands_alone_without_body() {
        let records = vec![record(1, 9, "Oddments"), record(1, 5, "Match report")];
        let sections = partition_sections(records, &directory(), 5);

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].category_id, 9);
        assert_eq!(sections[0].heading, "Category 9");
        assert_eq!(sections[1].category_id, 5);
    }

    #[test]
    fn test_trailing_only_group_yields_one_section() {
        let records = vec![record(1, 5, "Match report")];
        let sections = partition_sections(records, &directory(), 5);

        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].category_id, 5);
        assert_eq!(sections[0].heading, "Sport");
    }

    #[test]
    fn test_compact_groups_by_source_ascending() {
        let records = vec![
            record(2, 1, "Second source"),
            record(1, 1, "First source"),
            record(2, 1, "Second again"),
        ];
        let sources = vec![source(1, "Daily Echo"), source(2, "Sports Desk")];
        let digests = compact(
            records,
            &sources,
            &directory(),
            5,
            content_date(),
            run_date(),
        );

        assert_eq!(digests.len(), 2);
        assert_eq!(digests[0].source_id, 1);
        assert_eq!(digests[0].title, "Daily Echo");
        assert_eq!(digests[0].article_count(), 1);
        assert_eq!(digests[1].source_id, 2);
        assert_eq!(digests[1].article_count(), 2);
        assert_eq!(digests[1].language, "hr");
        assert_eq!(digests[1].run_date, run_date());
        assert_eq!(digests[1].content_date, content_date());
    }

    #[test]
    fn test_compact_drops_unknown_source() {
        let records = vec![record(99, 1, "Stale"), record(1, 1, "Fresh")];
        let sources = vec![source(1, "Daily Echo")];
        let digests = compact(
            records,
            &sources,
            &directory(),
            5,
            content_date(),
            run_date(),
        );

        assert_eq!(digests.len(), 1);
        assert_eq!(digests[0].source_id, 1);
    }

    #[test]
    fn test_compact_skips_unresolved_display_name() {
        let records = vec![record(1, 1, "Orphaned")];
        let sources = vec![source(1, "   ")];
        let digests = compact(
            records,
            &sources,
            &directory(),
            5,
            content_date(),
            run_date(),
        );

        assert!(digests.is_empty());
    }

    #[test]
    fn test_compact_no_records_no_digests() {
        let sources = vec![source(1, "Daily Echo")];
        let digests = compact(
            Vec::new(),
            &sources,
            &directory(),
            5,
            content_date(),
            run_date(),
        );

        assert!(digests.is_empty());
    }
}
