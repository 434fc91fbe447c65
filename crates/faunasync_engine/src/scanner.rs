//! Windowed full scanner
//!
//! Sweeps backward in time from an end date to a floor date, one window per
//! iteration. Each completed window's record count feeds the PID regulator,
//! which sizes the next window so per-request volume stays near the target.
//! Windows abut exactly: `end` of iteration i+1 equals `start` of iteration
//! i, so the union of all windows covers the whole range with no gap and no
//! overlap.
//!
//! Termination is unconditional: the regulator's minimum output is 1 day, so
//! every iteration strictly shrinks the remaining range.

use crate::error::Result;
use crate::paginator::fetch_all;
use crate::regulator::Pid;
use crate::tuning::Tuning;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use faunasync_client::{GroupId, Query, Transport, OBSERVATIONS_SEARCH};
use faunasync_store::Storage;
use serde_json::Value;
use tracing::info;

/// Wire date format for range query parameters
const WIRE_DATE_FORMAT: &str = "%d.%m.%Y";

/// Time bounds for one scan.
///
/// `end_date` defaults to now; `floor_date` defaults to the earliest date
/// the remote can hold, making the sweep exhaustive. A configured floor
/// turns it into a bounded refresh instead.
#[derive(Debug, Clone, Default)]
pub struct ScanBounds {
    pub end_date: Option<DateTime<Utc>>,
    pub floor_date: Option<DateTime<Utc>>,
}

/// What a completed scan covered.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOutcome {
    /// Number of windows swept
    pub windows: u64,
    /// Total records fetched and stored
    pub records: u64,
}

/// Backward time-sweep scanner for one logical group at a time.
pub struct FullScanner<'a, T: ?Sized, S: ?Sized> {
    transport: &'a T,
    storage: &'a S,
    tuning: Tuning,
}

impl<'a, T, S> FullScanner<'a, T, S>
where
    T: Transport + ?Sized,
    S: Storage + ?Sized,
{
    pub fn new(transport: &'a T, storage: &'a S, tuning: Tuning) -> Self {
        Self {
            transport,
            storage,
            tuning,
        }
    }

    /// Sweep one group from `bounds.end_date` back to `bounds.floor_date`.
    ///
    /// `sub_filters` narrows each window query (one paginated fetch per
    /// sub-filter per window, e.g. one per territorial unit); an empty slice
    /// means a single unfiltered pass. The regulator sees the count summed
    /// across all sub-filters of a window, aggregate throughput being what
    /// the source rate-limits on.
    ///
    /// A transfer failure aborts the whole scan for the group; records
    /// stored so far stay stored, and re-running from scratch is safe
    /// because storage upserts by record id.
    pub fn scan(
        &self,
        group: &GroupId,
        sub_filters: &[Query],
        bounds: &ScanBounds,
    ) -> Result<ScanOutcome> {
        let end_date = bounds.end_date.unwrap_or_else(Utc::now);
        let floor_date = bounds.floor_date.unwrap_or_else(earliest_floor);

        // Fresh controller per scan invocation, accumulators at zero.
        let mut pid = Pid::new(
            self.tuning.pid_kp,
            self.tuning.pid_ki,
            self.tuning.pid_kd,
            self.tuning.pid_setpoint,
            self.tuning.pid_limit_min,
            self.tuning.pid_limit_max,
        );
        let mut width_days = self.tuning.pid_delta_days.max(1);

        let unfiltered = [Query::new()];
        let passes: &[Query] = if sub_filters.is_empty() {
            &unfiltered
        } else {
            sub_filters
        };

        let mut outcome = ScanOutcome::default();
        let mut end = end_date;
        let mut seq: u64 = 1;

        while end > floor_date {
            let start = end - Duration::days(width_days);
            let chunk = format!("{group}_{seq}");
            let mut measured: u64 = 0;

            for filter in passes {
                let query = window_query(group, filter, start, end);
                measured += fetch_all(
                    self.transport,
                    OBSERVATIONS_SEARCH,
                    &query,
                    &self.tuning,
                    |page| {
                        self.storage.store(group, &chunk, &page.items)?;
                        Ok(())
                    },
                )?;
            }

            info!(
                group = %group,
                seq,
                count = measured,
                from = %start.format(WIRE_DATE_FORMAT),
                to = %end.format(WIRE_DATE_FORMAT),
                width_days,
                "Window complete"
            );

            width_days = (pid.next_width(measured as f64) as i64).max(1);
            end = start;
            seq += 1;
            outcome.windows += 1;
            outcome.records += measured;
        }

        Ok(outcome)
    }
}

/// Base query for one window: the half-open range `[start, end)` plus the
/// group and any sub-filter parameters.
fn window_query(group: &GroupId, filter: &Query, start: DateTime<Utc>, end: DateTime<Utc>) -> Query {
    let mut query = Query::new();
    query.insert("period_choice".into(), Value::String("range".into()));
    query.insert(
        "date_from".into(),
        Value::String(start.format(WIRE_DATE_FORMAT).to_string()),
    );
    query.insert(
        "date_to".into(),
        Value::String(end.format(WIRE_DATE_FORMAT).to_string()),
    );
    query.insert("species_choice".into(), Value::String("all".into()));
    query.insert("taxonomic_group".into(), Value::String(group.0.clone()));
    for (key, value) in filter {
        query.insert(key.clone(), value.clone());
    }
    query
}

/// Earliest representable floor: the sweep is exhaustive unless configured
/// otherwise.
fn earliest_floor() -> DateTime<Utc> {
    let date = NaiveDate::from_ymd_opt(1900, 1, 1).expect("valid constant date");
    DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0).expect("valid midnight"), Utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{page, MockTransport};
    use faunasync_store::MemoryStore;
    use serde_json::json;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0).unwrap(), Utc)
    }

    fn parsed_range(query: &Query) -> (NaiveDate, NaiveDate) {
        let from = NaiveDate::parse_from_str(
            query["date_from"].as_str().unwrap(),
            WIRE_DATE_FORMAT,
        )
        .unwrap();
        let to =
            NaiveDate::parse_from_str(query["date_to"].as_str().unwrap(), WIRE_DATE_FORMAT)
                .unwrap();
        (from, to)
    }

    /// Fixed 3-day windows: limits pin the controller output.
    fn fixed_width_tuning(days: f64) -> Tuning {
        Tuning {
            pid_kp: 0.0,
            pid_ki: 0.0,
            pid_kd: 0.0,
            pid_limit_min: days,
            pid_limit_max: days,
            pid_delta_days: days as i64,
            ..Tuning::default()
        }
    }

    #[test]
    fn test_windows_abut_and_cover_range() {
        let transport = MockTransport::new();
        let store = MemoryStore::new();
        let scanner = FullScanner::new(&transport, &store, fixed_width_tuning(3.0));

        let bounds = ScanBounds {
            end_date: Some(utc(2020, 1, 10)),
            floor_date: Some(utc(2020, 1, 1)),
        };
        let outcome = scanner
            .scan(&GroupId::from("1"), &[], &bounds)
            .unwrap();

        assert_eq!(outcome.windows, 3);

        let log = transport.fetch_log();
        assert_eq!(log.len(), 3);
        let ranges: Vec<_> = log.iter().map(|(_, q)| parsed_range(q)).collect();
        // Backward sweep: [7,10), [4,7), [1,4)
        assert_eq!(ranges[0].1, NaiveDate::from_ymd_opt(2020, 1, 10).unwrap());
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].0, pair[1].1, "windows must abut exactly");
        }
        assert!(ranges.last().unwrap().0 <= NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
    }

    #[test]
    fn test_scan_terminates_for_any_gains() {
        // Aggressive gains, tiny range: must still terminate because
        // output_min >= 1 day.
        let transport = MockTransport::new();
        let store = MemoryStore::new();
        let tuning = Tuning {
            pid_kp: 5.0,
            pid_ki: 2.0,
            pid_kd: 1.0,
            pid_limit_min: 1.0,
            pid_limit_max: 30.0,
            pid_delta_days: 1,
            ..Tuning::default()
        };
        let scanner = FullScanner::new(&transport, &store, tuning);

        let bounds = ScanBounds {
            end_date: Some(utc(2020, 1, 10)),
            floor_date: Some(utc(2020, 1, 1)),
        };
        let outcome = scanner
            .scan(&GroupId::from("1"), &[], &bounds)
            .unwrap();
        assert!(outcome.windows >= 1);
        assert!(outcome.windows <= 9);
    }

    #[test]
    fn test_controller_sees_aggregate_of_sub_filters() {
        // Two sub-filters returning 300 records each. With kp=0.05 and
        // setpoint 300, the aggregate of 600 drives the next window down to
        // the 1-day floor; per-filter accounting would have held it at 10.
        let transport = MockTransport::new();
        let ids_a: Vec<String> = (0..300).map(|i| format!("a{i}")).collect();
        let ids_b: Vec<String> = (0..300).map(|i| format!("b{i}")).collect();
        fn refs(v: &[String]) -> Vec<&str> {
            v.iter().map(String::as_str).collect()
        }
        transport.push_page(page(&refs(&ids_a)));
        transport.push_page(page(&refs(&ids_b)));

        let store = MemoryStore::new();
        let tuning = Tuning {
            pid_kp: 0.05,
            pid_ki: 0.0,
            pid_kd: 0.0,
            pid_setpoint: 300.0,
            pid_limit_min: 1.0,
            pid_limit_max: 30.0,
            pid_delta_days: 10,
            ..Tuning::default()
        };
        let scanner = FullScanner::new(&transport, &store, tuning);

        let mut unit_a = Query::new();
        unit_a.insert("territorial_unit_ids".into(), json!("07"));
        let mut unit_b = Query::new();
        unit_b.insert("territorial_unit_ids".into(), json!("25"));

        let bounds = ScanBounds {
            end_date: Some(utc(2020, 1, 20)),
            floor_date: Some(utc(2020, 1, 1)),
        };
        scanner
            .scan(&GroupId::from("1"), &[unit_a, unit_b], &bounds)
            .unwrap();

        let log = transport.fetch_log();
        // First window: 2 sub-filter fetches over [10, 20).
        let (w1_from, w1_to) = parsed_range(&log[0].1);
        assert_eq!((w1_to - w1_from).num_days(), 10);
        // Second window shrank to 1 day: aggregate feedback applied.
        let (w2_from, w2_to) = parsed_range(&log[2].1);
        assert_eq!((w2_to - w2_from).num_days(), 1);
        assert_eq!(store.len(), 600);
    }

    #[test]
    fn test_rerun_after_failure_matches_clean_run() {
        let bounds = ScanBounds {
            end_date: Some(utc(2020, 1, 10)),
            floor_date: Some(utc(2020, 1, 1)),
        };
        let group = GroupId::from("1");

        // Interrupted run: window 3 of 3 fails mid-scan.
        let store = MemoryStore::new();
        let transport = MockTransport::new();
        transport.push_page(page(&["1", "2"]));
        transport.push_page(page(&["3"]));
        transport.push_failure();
        let scanner = FullScanner::new(&transport, &store, fixed_width_tuning(3.0));
        assert!(scanner.scan(&group, &[], &bounds).is_err());
        assert_eq!(store.len(), 3);

        // Retry from scratch against the same store.
        let transport = MockTransport::new();
        transport.push_page(page(&["1", "2"]));
        transport.push_page(page(&["3"]));
        transport.push_page(page(&["4"]));
        let scanner = FullScanner::new(&transport, &store, fixed_width_tuning(3.0));
        scanner.scan(&group, &[], &bounds).unwrap();

        // Uninterrupted run on a fresh store.
        let clean_store = MemoryStore::new();
        let transport = MockTransport::new();
        transport.push_page(page(&["1", "2"]));
        transport.push_page(page(&["3"]));
        transport.push_page(page(&["4"]));
        let scanner = FullScanner::new(&transport, &clean_store, fixed_width_tuning(3.0));
        scanner.scan(&group, &[], &bounds).unwrap();

        assert_eq!(store.ids(), clean_store.ids());
    }

    #[test]
    fn test_no_windows_when_end_at_floor() {
        let transport = MockTransport::new();
        let store = MemoryStore::new();
        let scanner = FullScanner::new(&transport, &store, fixed_width_tuning(3.0));

        let bounds = ScanBounds {
            end_date: Some(utc(2020, 1, 1)),
            floor_date: Some(utc(2020, 1, 1)),
        };
        let outcome = scanner
            .scan(&GroupId::from("1"), &[], &bounds)
            .unwrap();
        assert_eq!(outcome.windows, 0);
        assert!(transport.fetch_log().is_empty());
    }
}
