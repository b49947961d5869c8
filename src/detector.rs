//! Change detection and per-project aggregation.
//!
//! For each watched table the detector fetches a snapshot, fingerprints it and
//! compares against the last fingerprint in the store. A missing or different
//! fingerprint means the table changed and yields an [`UpdateEvent`]. Events of
//! one project are then folded into a [`ProjectCycleSummary`].

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::Result;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::snapshot::{CellValue, TableSnapshot};
use crate::source::SnapshotFetcher;
use crate::store::FingerprintStore;

/// Columns checked, in priority order, for the user to credit with a change.
pub const TOP_USER_FIELDS: [&str; 4] = ["incharge_name", "technician", "user", "created_by"];

/// A table whose content differs from the previous observation.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEvent {
    pub table_name: String,
    /// Row count of the new snapshot (not a count of changed rows).
    pub update_count: u64,
    pub last_updated: DateTime<Utc>,
    pub top_user: Option<String>,
    /// Equals `update_count` when a top user was found, otherwise 0.
    pub top_user_count: u64,
    pub day: NaiveDate,
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: u32,
    /// 1 = January .. 12 = December.
    pub month: u32,
}

impl UpdateEvent {
    /// Build the event for a changed table observed at `detected_at`.
    pub fn new(table: &str, snapshot: &TableSnapshot, detected_at: DateTime<Utc>) -> Self {
        let update_count = snapshot.len() as u64;
        let top_user = top_user(snapshot);
        let top_user_count = if top_user.is_some() { update_count } else { 0 };

        Self {
            table_name: table.to_string(),
            update_count,
            last_updated: detected_at,
            top_user,
            top_user_count,
            day: detected_at.date_naive(),
            weekday: detected_at.weekday().num_days_from_monday(),
            month: detected_at.month(),
        }
    }
}

/// Per-project roll-up of one cycle's events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectCycleSummary {
    /// Distinct users credited across the project's changed tables.
    pub total_users: usize,
    pub top_user: Option<String>,
    pub top_user_count: u64,
}

impl ProjectCycleSummary {
    /// Sum attributed counts per user and pick the largest.
    ///
    /// Ties go to the user credited first, in event order.
    pub fn from_events(events: &[UpdateEvent]) -> Self {
        let mut per_user: IndexMap<&str, u64> = IndexMap::new();
        for event in events {
            if let Some(user) = event.top_user.as_deref() {
                *per_user.entry(user).or_default() += event.top_user_count;
            }
        }

        let mut top: Option<(&str, u64)> = None;
        for (user, count) in &per_user {
            if top.map_or(true, |(_, best)| *count > best) {
                top = Some((user, *count));
            }
        }

        Self {
            total_users: per_user.len(),
            top_user: top.map(|(user, _)| user.to_string()),
            top_user_count: top.map_or(0, |(_, count)| count),
        }
    }
}

/// Everything one project reports for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectChanges {
    pub project: String,
    pub detected_at: DateTime<Utc>,
    pub summary: ProjectCycleSummary,
    pub events: Vec<UpdateEvent>,
    /// New fingerprints of the changed tables, saved by [`ChangeDetector::commit`].
    pub fingerprints: Vec<(String, Fingerprint)>,
}

/// Pick the user credited with a table's change.
///
/// Only the first row is sampled. The first candidate column present in it
/// decides, even when its value is NULL; NULL or empty values credit nobody.
pub fn top_user(snapshot: &TableSnapshot) -> Option<String> {
    let first = snapshot.first()?;
    let value = TOP_USER_FIELDS.iter().find_map(|field| first.get(*field))?;

    match value {
        CellValue::Null => None,
        CellValue::Text(text) if text.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// Compares fresh snapshots against the fingerprint store.
pub struct ChangeDetector {
    store: Arc<dyn FingerprintStore>,
}

impl ChangeDetector {
    pub fn new(store: Arc<dyn FingerprintStore>) -> Self {
        Self { store }
    }

    /// Poll every table of a project once.
    ///
    /// Returns `None` when no table changed. The store is not touched: the
    /// new fingerprints travel with the changes and are saved by
    /// [`commit`](Self::commit) once the metrics were written.
    pub async fn detect(
        &self,
        project: &str,
        tables: &[String],
        source: &dyn SnapshotFetcher,
        detected_at: DateTime<Utc>,
    ) -> Result<Option<ProjectChanges>> {
        let mut events = Vec::new();
        let mut fingerprints: Vec<(String, Fingerprint)> = Vec::new();

        for table in tables {
            let snapshot = source.fetch(table).await?;
            let digest = fingerprint(&snapshot);
            let previous = self.store.get(project, table).await?;

            if previous == Some(digest) {
                debug!(project, table = %table, "Table unchanged");
                continue;
            }

            let event = UpdateEvent::new(table, &snapshot, detected_at);
            debug!(
                project,
                table = %table,
                fingerprint = %digest,
                first_sighting = previous.is_none(),
                update_count = event.update_count,
                top_user = event.top_user.as_deref().unwrap_or(""),
                "Table changed"
            );
            fingerprints.push((table.clone(), digest));
            events.push(event);
        }

        if events.is_empty() {
            return Ok(None);
        }

        let summary = ProjectCycleSummary::from_events(&events);
        info!(
            project,
            changed_tables = events.len(),
            total_users = summary.total_users,
            top_user = summary.top_user.as_deref().unwrap_or(""),
            top_user_count = summary.top_user_count,
            "Detected table changes"
        );

        Ok(Some(ProjectChanges {
            project: project.to_string(),
            detected_at,
            summary,
            events,
            fingerprints,
        }))
    }

    /// Record the fingerprints of delivered changes.
    pub async fn commit(&self, changes: &ProjectChanges) -> Result<()> {
        for (table, digest) in &changes.fingerprints {
            self.store.put(&changes.project, table, *digest).await?;
        }
        debug!(
            project = %changes.project,
            tables = changes.fingerprints.len(),
            "Fingerprints committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::snapshot::row;
    use crate::source::mock::MockSource;
    use crate::store::InMemoryFingerprintStore;

    fn at() -> DateTime<Utc> {
        // A Wednesday.
        Utc.with_ymd_and_hms(2024, 5, 15, 9, 30, 0).unwrap()
    }

    fn tables(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn event(user: Option<&str>, count: u64) -> UpdateEvent {
        UpdateEvent {
            table_name: "t".to_string(),
            update_count: count,
            last_updated: at(),
            top_user: user.map(str::to_string),
            top_user_count: if user.is_some() { count } else { 0 },
            day: at().date_naive(),
            weekday: 2,
            month: 5,
        }
    }

    #[test]
    fn test_top_user_from_technician() {
        let snapshot = TableSnapshot::new(vec![
            row([("id", CellValue::Int(1)), ("technician", "Alice".into())]),
            row([("id", CellValue::Int(2)), ("technician", "Bob".into())]),
        ]);
        assert_eq!(top_user(&snapshot).as_deref(), Some("Alice"));
    }

    #[test]
    fn test_top_user_priority_order() {
        let snapshot = TableSnapshot::new(vec![row([
            ("created_by", "Carol"),
            ("technician", "Alice"),
            ("incharge_name", "Dev"),
        ])]);
        assert_eq!(top_user(&snapshot).as_deref(), Some("Dev"));
    }

    #[test]
    fn test_top_user_absent_without_candidate_fields() {
        let snapshot = TableSnapshot::new(vec![row([("id", 1), ("plate", 7)])]);
        assert_eq!(top_user(&snapshot), None);

        let event = UpdateEvent::new("vehicles", &snapshot, at());
        assert_eq!(event.top_user, None);
        assert_eq!(event.top_user_count, 0);
        assert_eq!(event.update_count, 1);
    }

    #[test]
    fn test_top_user_only_samples_first_row() {
        let snapshot = TableSnapshot::new(vec![
            row([("id", 1)]),
            row([("id", CellValue::Int(2)), ("user", "Eve".into())]),
        ]);
        assert_eq!(top_user(&snapshot), None);
    }

    #[test]
    fn test_null_candidate_stops_search() {
        let snapshot = TableSnapshot::new(vec![row([
            ("incharge_name", CellValue::Null),
            ("technician", "Alice".into()),
        ])]);
        assert_eq!(top_user(&snapshot), None);
    }

    #[test]
    fn test_empty_candidate_credits_nobody() {
        let snapshot = TableSnapshot::new(vec![row([("user", "")])]);
        assert_eq!(top_user(&snapshot), None);
    }

    #[test]
    fn test_empty_snapshot_has_no_top_user() {
        assert_eq!(top_user(&TableSnapshot::default()), None);
    }

    #[test]
    fn test_event_calendar_fields() {
        let snapshot = TableSnapshot::new(vec![row([("technician", "Alice")])]);
        let event = UpdateEvent::new("jobs", &snapshot, at());

        assert_eq!(event.last_updated, at());
        assert_eq!(event.day, NaiveDate::from_ymd_opt(2024, 5, 15).unwrap());
        assert_eq!(event.weekday, 2);
        assert_eq!(event.month, 5);
        assert_eq!(event.top_user_count, 1);
    }

    #[test]
    fn test_summary_sums_same_user() {
        let summary = ProjectCycleSummary::from_events(&[event(Some("Alice"), 5), event(Some("Alice"), 7)]);
        assert_eq!(summary.total_users, 1);
        assert_eq!(summary.top_user.as_deref(), Some("Alice"));
        assert_eq!(summary.top_user_count, 12);
    }

    #[test]
    fn test_summary_picks_largest_user() {
        let summary = ProjectCycleSummary::from_events(&[
            event(Some("Alice"), 3),
            event(Some("Bob"), 4),
            event(None, 50),
            event(Some("Alice"), 2),
        ]);
        assert_eq!(summary.total_users, 2);
        assert_eq!(summary.top_user.as_deref(), Some("Alice"));
        assert_eq!(summary.top_user_count, 5);
    }

    #[test]
    fn test_summary_tie_goes_to_first_user() {
        let summary = ProjectCycleSummary::from_events(&[event(Some("Bob"), 4), event(Some("Alice"), 4)]);
        assert_eq!(summary.top_user.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_summary_without_users() {
        let summary = ProjectCycleSummary::from_events(&[event(None, 9)]);
        assert_eq!(summary, ProjectCycleSummary::default());
    }

    #[tokio::test]
    async fn test_first_sighting_is_change() {
        let source = MockSource::new();
        source.push_row("vehicles", row([("technician", "Alice")])).await;
        let detector = ChangeDetector::new(Arc::new(InMemoryFingerprintStore::new()));

        let changes = detector
            .detect("Fleet", &tables(&["vehicles"]), &source, at())
            .await
            .unwrap()
            .expect("first sighting reports a change");

        assert_eq!(changes.project, "Fleet");
        assert_eq!(changes.events.len(), 1);
        assert_eq!(changes.events[0].top_user.as_deref(), Some("Alice"));
        assert_eq!(changes.summary.total_users, 1);
    }

    #[tokio::test]
    async fn test_no_spurious_change() {
        let source = MockSource::new();
        source.push_row("vehicles", row([("id", 1)])).await;
        let detector = ChangeDetector::new(Arc::new(InMemoryFingerprintStore::new()));
        let watched = tables(&["vehicles"]);

        let first = detector.detect("Fleet", &watched, &source, at()).await.unwrap().unwrap();
        detector.commit(&first).await.unwrap();
        assert!(detector.detect("Fleet", &watched, &source, at()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_project_aggregation_across_tables() {
        let source = MockSource::new();
        for i in 0..5 {
            source.push_row("jobs", row([("id", CellValue::Int(i)), ("user", "Alice".into())])).await;
        }
        for i in 0..7 {
            source.push_row("repairs", row([("id", CellValue::Int(i)), ("technician", "Alice".into())])).await;
        }
        let detector = ChangeDetector::new(Arc::new(InMemoryFingerprintStore::new()));

        let changes = detector
            .detect("Garage", &tables(&["jobs", "repairs"]), &source, at())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(changes.summary.total_users, 1);
        assert_eq!(changes.summary.top_user_count, 12);
    }

    #[tokio::test]
    async fn test_failed_scan_leaves_store_untouched() {
        let source = MockSource::new();
        source.push_row("vehicles", row([("id", 1)])).await;
        source.push_row("drivers", row([("id", 1)])).await;
        source.set_fail_on_table("drivers", true).await;
        let store = Arc::new(InMemoryFingerprintStore::new());
        let detector = ChangeDetector::new(store.clone());

        let result = detector
            .detect("Fleet", &tables(&["vehicles", "drivers"]), &source, at())
            .await;

        assert!(result.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_detect_defers_store_until_commit() {
        let source = MockSource::new();
        source.push_row("vehicles", row([("id", 1)])).await;
        source.push_row("drivers", row([("id", 1)])).await;
        let store = Arc::new(InMemoryFingerprintStore::new());
        let detector = ChangeDetector::new(store.clone());
        let watched = tables(&["vehicles", "drivers"]);

        let changes = detector.detect("Fleet", &watched, &source, at()).await.unwrap().unwrap();
        assert!(store.is_empty().await);
        let staged: Vec<&str> = changes.fingerprints.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(staged, vec!["vehicles", "drivers"]);

        // Uncommitted changes are reported again.
        assert!(detector.detect("Fleet", &watched, &source, at()).await.unwrap().is_some());

        detector.commit(&changes).await.unwrap();
        assert_eq!(store.len().await, 2);
        assert!(detector.detect("Fleet", &watched, &source, at()).await.unwrap().is_none());
    }
}
