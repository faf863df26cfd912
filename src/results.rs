//! Results engine
//!
//! Pure functions over a session: tally per-item totals, attach one-decimal
//! percentages, rank descending by votes with a stable sort so tied items
//! keep their original definition order. That ordering guarantee is what
//! makes exports reproducible, so it must not change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Session, SessionSettings, SessionStatus};

/// Tallied result for one item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemResult {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub votes: i64,
    pub percentage: f64,
}

/// Rank a session's votes into per-item results.
///
/// Vote allocations referencing unknown item ids are skipped. With zero
/// items or zero votes the result is empty or all-zero, never an error.
pub fn compute_results(session: &Session) -> Vec<ItemResult> {
    let mut results: Vec<ItemResult> = session
        .items
        .iter()
        .map(|item| ItemResult {
            id: item.id,
            name: item.name.clone(),
            description: item.description.clone(),
            votes: 0,
            percentage: 0.0,
        })
        .collect();

    let mut total_votes: i64 = 0;
    for allocation in session.votes.values() {
        for (item_id, count) in allocation {
            if let Some(result) = results.iter_mut().find(|r| r.id == *item_id) {
                result.votes += count;
                total_votes += count;
            }
        }
    }

    if total_votes > 0 {
        for result in &mut results {
            result.percentage = round1(result.votes as f64 / total_votes as f64 * 100.0);
        }
    }

    // Stable: ties keep the item definition order.
    results.sort_by(|a, b| b.votes.cmp(&a.votes));
    results
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Render ranked results as CSV.
///
/// Header and row shape are fixed: `Position, Item Name, Description,
/// Votes, Percentage`, one row per item in results order, percentages
/// formatted `NN.N%`.
pub fn results_csv(session: &Session) -> String {
    let mut out = String::from("Position,Item Name,Description,Votes,Percentage\r\n");
    for (position, result) in compute_results(session).iter().enumerate() {
        out.push_str(&format!(
            "{},{},{},{},{:.1}%\r\n",
            position + 1,
            csv_field(&result.name),
            csv_field(&result.description),
            result.votes,
            result.percentage,
        ));
    }
    out
}

/// Quote a CSV field when it contains a delimiter, quote, or newline
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One entry in the voting timeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    /// Suppressed when the session is anonymous
    pub participant_id: Option<String>,
}

/// Participation summary for a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAnalytics {
    pub session_id: String,
    pub title: String,
    pub status: SessionStatus,
    pub created: DateTime<Utc>,
    pub completed: Option<DateTime<Utc>>,
    pub total_participants: usize,
    pub voted_participants: usize,
    /// Percentage of participants who voted, one decimal; zero when the
    /// session has no participants
    pub participation_rate: f64,
    pub total_items: usize,
    pub vote_timeline: Vec<TimelineEntry>,
    pub settings: SessionSettings,
}

/// Summarize participation and the vote timeline for a session
pub fn compute_analytics(session: &Session) -> SessionAnalytics {
    let total_participants = session.participants.len();
    let voted_participants = session.voted_count();

    let participation_rate = if total_participants > 0 {
        round1(voted_participants as f64 / total_participants as f64 * 100.0)
    } else {
        0.0
    };

    let mut vote_timeline: Vec<TimelineEntry> = session
        .participants
        .iter()
        .filter_map(|(id, p)| {
            p.vote_timestamp.map(|timestamp| TimelineEntry {
                timestamp,
                participant_id: if session.settings.anonymous {
                    None
                } else {
                    Some(id.clone())
                },
            })
        })
        .collect();
    vote_timeline.sort_by_key(|e| e.timestamp);

    SessionAnalytics {
        session_id: session.id.clone(),
        title: session.title.clone(),
        status: session.status,
        created: session.created,
        completed: session.completed,
        total_participants,
        voted_participants,
        participation_rate,
        total_items: session.items.len(),
        vote_timeline,
        settings: session.settings.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VoteAllocation;

    fn lunch_session() -> Session {
        let mut session = Session::new("Team lunch", "");
        for name in ["Pizza", "Burger", "Sushi", "Tacos"] {
            session.add_item(name, "").unwrap();
        }
        session
    }

    #[test]
    fn test_worked_example_totals_and_ranking() {
        let mut session = lunch_session();
        let p1 = session.add_participant("p1@example.com");
        let p2 = session.add_participant("p2@example.com");
        session.record_vote(&p1, VoteAllocation::from([(1, 5), (2, 3), (3, 2), (4, 0)]));
        session.record_vote(&p2, VoteAllocation::from([(1, 2), (2, 6), (3, 1), (4, 1)]));

        let results = compute_results(&session);
        let summary: Vec<(&str, i64, f64)> = results
            .iter()
            .map(|r| (r.name.as_str(), r.votes, r.percentage))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("Burger", 9, 45.0),
                ("Pizza", 7, 35.0),
                ("Sushi", 3, 15.0),
                ("Tacos", 1, 5.0),
            ]
        );
    }

    #[test]
    fn test_percentages_sum_to_one_hundred() {
        let mut session = lunch_session();
        let p1 = session.add_participant("p1@example.com");
        session.record_vote(&p1, VoteAllocation::from([(1, 1), (2, 1), (3, 1)]));

        let results = compute_results(&session);
        let sum: f64 = results.iter().map(|r| r.percentage).sum();
        assert!((sum - 100.0).abs() < 0.2, "sum was {sum}");
    }

    #[test]
    fn test_ties_keep_item_definition_order() {
        let mut session = Session::new("Tied", "");
        session.add_item("A", "").unwrap();
        session.add_item("B", "").unwrap();
        session.add_item("C", "").unwrap();
        let p = session.add_participant("p@example.com");
        session.record_vote(&p, VoteAllocation::from([(1, 5), (2, 5), (3, 1)]));

        let results = compute_results(&session);
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_zero_votes_yields_all_zero() {
        let session = lunch_session();
        let results = compute_results(&session);
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.votes == 0 && r.percentage == 0.0));

        let empty = Session::new("No items", "");
        assert!(compute_results(&empty).is_empty());
    }

    #[test]
    fn test_unknown_item_ids_are_skipped() {
        let mut session = Session::new("Sparse", "");
        session.add_item("Only", "").unwrap();
        let p = session.add_participant("p@example.com");
        session.record_vote(&p, VoteAllocation::from([(1, 3), (99, 7)]));

        let results = compute_results(&session);
        assert_eq!(results[0].votes, 3);
        assert_eq!(results[0].percentage, 100.0);
    }

    #[test]
    fn test_csv_format() {
        let mut session = lunch_session();
        let p1 = session.add_participant("p1@example.com");
        let p2 = session.add_participant("p2@example.com");
        session.record_vote(&p1, VoteAllocation::from([(1, 5), (2, 3), (3, 2), (4, 0)]));
        session.record_vote(&p2, VoteAllocation::from([(1, 2), (2, 6), (3, 1), (4, 1)]));

        let csv = results_csv(&session);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Position,Item Name,Description,Votes,Percentage");
        assert_eq!(lines[1], "1,Burger,,9,45.0%");
        assert_eq!(lines[2], "2,Pizza,,7,35.0%");
        assert_eq!(lines[4], "4,Tacos,,1,5.0%");
    }

    #[test]
    fn test_csv_quotes_fields_with_commas() {
        let mut session = Session::new("Quoting", "");
        session.add_item("Fish, chips", "crispy \"classic\"").unwrap();
        let p = session.add_participant("p@example.com");
        session.record_vote(&p, VoteAllocation::from([(1, 2)]));

        let csv = results_csv(&session);
        assert!(csv.contains("\"Fish, chips\",\"crispy \"\"classic\"\"\""));
    }

    #[test]
    fn test_analytics_participation_and_anonymity() {
        let mut session = lunch_session();
        let p1 = session.add_participant("p1@example.com");
        let _p2 = session.add_participant("p2@example.com");
        let p3 = session.add_participant("p3@example.com");
        session.record_vote(&p1, VoteAllocation::from([(1, 1)]));
        session.record_vote(&p3, VoteAllocation::from([(2, 1)]));

        let analytics = compute_analytics(&session);
        assert_eq!(analytics.total_participants, 3);
        assert_eq!(analytics.voted_participants, 2);
        assert_eq!(analytics.participation_rate, 66.7);
        assert_eq!(analytics.vote_timeline.len(), 2);
        // Anonymous sessions never expose participant ids in the timeline.
        assert!(analytics
            .vote_timeline
            .iter()
            .all(|e| e.participant_id.is_none()));

        session.settings.anonymous = false;
        let named = compute_analytics(&session);
        assert!(named
            .vote_timeline
            .iter()
            .all(|e| e.participant_id.is_some()));

        let empty = Session::new("Nobody", "");
        assert_eq!(compute_analytics(&empty).participation_rate, 0.0);
    }
}
