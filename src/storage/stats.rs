//! Search log, visitor counters and the admin flag.

use super::{get_typed, update_typed, KeyValueStore};
use crate::error::StoreError;
use crate::models::{DeviceType, PeriodCounter, SearchLogEntry, VisitorStats};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const SEARCH_LOG_KEY: &str = "searchLog";
pub const VISITOR_STATS_KEY: &str = "visitorStats";
pub const ADMIN_AUTH_KEY: &str = "adminAuth";

/// Oldest entries are evicted beyond this size.
pub const SEARCH_LOG_CAPACITY: usize = 100;

/// Calendar period keys of an instant: day, month, year (UTC).
fn period_keys(at: DateTime<Utc>) -> (String, String, String) {
    (
        at.format("%Y-%m-%d").to_string(),
        at.format("%Y-%m").to_string(),
        at.format("%Y").to_string(),
    )
}

fn advance(counter: PeriodCounter, period: &str) -> PeriodCounter {
    if counter.period == period {
        PeriodCounter {
            count: counter.count + 1,
            ..counter
        }
    } else {
        PeriodCounter {
            period: period.to_string(),
            count: 1,
        }
    }
}

/// Append a search, keeping at most [`SEARCH_LOG_CAPACITY`] entries.
/// Returns the log size after the append.
pub fn record_search(
    store: &dyn KeyValueStore,
    url: &str,
    device: DeviceType,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let log = update_typed(store, SEARCH_LOG_KEY, |log: Option<Vec<SearchLogEntry>>| {
        let mut log = log.unwrap_or_default();
        log.push(SearchLogEntry {
            url: url.to_string(),
            timestamp: now,
            device,
        });
        if log.len() > SEARCH_LOG_CAPACITY {
            let excess = log.len() - SEARCH_LOG_CAPACITY;
            log.drain(..excess);
        }
        log
    })?;
    Ok(log.len())
}

pub fn search_log(store: &dyn KeyValueStore) -> Result<Vec<SearchLogEntry>, StoreError> {
    Ok(get_typed(store, SEARCH_LOG_KEY)?.unwrap_or_default())
}

/// Count a visit. Each counter restarts at 1 when its period changes.
pub fn record_visit(
    store: &dyn KeyValueStore,
    now: DateTime<Utc>,
) -> Result<VisitorStats, StoreError> {
    let (day, month, year) = period_keys(now);

    update_typed(store, VISITOR_STATS_KEY, |stats: Option<VisitorStats>| {
        match stats {
            Some(stats) => VisitorStats {
                daily: advance(stats.daily, &day),
                monthly: advance(stats.monthly, &month),
                yearly: advance(stats.yearly, &year),
            },
            None => VisitorStats {
                daily: PeriodCounter {
                    period: day.clone(),
                    count: 1,
                },
                monthly: PeriodCounter {
                    period: month.clone(),
                    count: 1,
                },
                yearly: PeriodCounter {
                    period: year.clone(),
                    count: 1,
                },
            },
        }
    })
}

pub fn visitor_stats(store: &dyn KeyValueStore) -> Result<Option<VisitorStats>, StoreError> {
    get_typed(store, VISITOR_STATS_KEY)
}

/// Searches within one calendar period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PeriodStats {
    pub total_searches: usize,
    /// Analyzed URLs, oldest first.
    pub analyzed_sites: Vec<String>,
}

/// Admin dashboard figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub daily: PeriodStats,
    pub monthly: PeriodStats,
    pub yearly: PeriodStats,
    pub visitors: Option<VisitorStats>,
}

/// Aggregate the search log into day, month and year totals.
pub fn dashboard_stats(
    store: &dyn KeyValueStore,
    now: DateTime<Utc>,
) -> Result<DashboardStats, StoreError> {
    let (day, month, year) = period_keys(now);
    let mut stats = DashboardStats {
        daily: PeriodStats::default(),
        monthly: PeriodStats::default(),
        yearly: PeriodStats::default(),
        visitors: visitor_stats(store)?,
    };

    for entry in search_log(store)? {
        let (entry_day, entry_month, entry_year) = period_keys(entry.timestamp);
        for (matches, period) in [
            (entry_day == day, &mut stats.daily),
            (entry_month == month, &mut stats.monthly),
            (entry_year == year, &mut stats.yearly),
        ] {
            if matches {
                period.total_searches += 1;
                period.analyzed_sites.push(entry.url.clone());
            }
        }
    }

    Ok(stats)
}

/// Clear the search log and the visitor counters.
pub fn reset_stats(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    store.remove(SEARCH_LOG_KEY)?;
    store.remove(VISITOR_STATS_KEY)
}

/// Plaintext admin flag; this is a gate, not authentication.
pub fn set_admin(store: &dyn KeyValueStore, enabled: bool) -> Result<(), StoreError> {
    if enabled {
        update_typed(store, ADMIN_AUTH_KEY, |_: Option<bool>| true)?;
        Ok(())
    } else {
        store.remove(ADMIN_AUTH_KEY)
    }
}

pub fn is_admin(store: &dyn KeyValueStore) -> Result<bool, StoreError> {
    Ok(get_typed(store, ADMIN_AUTH_KEY)?.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_search_log_evicts_oldest() {
        let store = MemoryStore::new();
        let now = at(2024, 3, 5);
        for i in 0..SEARCH_LOG_CAPACITY {
            record_search(&store, &format!("https://site{}.com", i), DeviceType::Desktop, now)
                .unwrap();
        }
        assert_eq!(search_log(&store).unwrap().len(), 100);

        let len = record_search(&store, "https://latest.com", DeviceType::Mobile, now).unwrap();

        let log = search_log(&store).unwrap();
        assert_eq!(len, 100);
        assert_eq!(log.len(), 100);
        assert_eq!(log[0].url, "https://site1.com");
        assert_eq!(log[99].url, "https://latest.com");
        assert_eq!(log[99].device, DeviceType::Mobile);
    }

    #[test]
    fn test_daily_counter_resets_monthly_accumulates() {
        let store = MemoryStore::new();
        record_visit(&store, at(2024, 3, 5)).unwrap();
        record_visit(&store, at(2024, 3, 5)).unwrap();

        let stats = record_visit(&store, at(2024, 3, 6)).unwrap();

        assert_eq!(stats.daily.period, "2024-03-06");
        assert_eq!(stats.daily.count, 1);
        assert_eq!(stats.monthly.count, 3);
        assert_eq!(stats.yearly.count, 3);
    }

    #[test]
    fn test_new_year_resets_everything() {
        let store = MemoryStore::new();
        record_visit(&store, at(2023, 12, 31)).unwrap();
        let stats = record_visit(&store, at(2024, 1, 1)).unwrap();

        assert_eq!(stats.daily.count, 1);
        assert_eq!(stats.monthly.period, "2024-01");
        assert_eq!(stats.monthly.count, 1);
        assert_eq!(stats.yearly.period, "2024");
        assert_eq!(stats.yearly.count, 1);
    }

    #[test]
    fn test_dashboard_groups_by_period() {
        let store = MemoryStore::new();
        record_search(&store, "https://old.com", DeviceType::Desktop, at(2023, 6, 1)).unwrap();
        record_search(&store, "https://march.com", DeviceType::Desktop, at(2024, 3, 1)).unwrap();
        record_search(&store, "https://today.com", DeviceType::Mobile, at(2024, 3, 5)).unwrap();
        record_search(&store, "https://jan.com", DeviceType::Desktop, at(2024, 1, 9)).unwrap();

        let stats = dashboard_stats(&store, at(2024, 3, 5)).unwrap();

        assert_eq!(stats.daily.total_searches, 1);
        assert_eq!(stats.daily.analyzed_sites, vec!["https://today.com"]);
        assert_eq!(stats.monthly.total_searches, 2);
        assert_eq!(stats.yearly.total_searches, 3);
        assert!(stats.visitors.is_none());
    }

    #[test]
    fn test_reset_stats_keeps_admin_flag() {
        let store = MemoryStore::new();
        set_admin(&store, true).unwrap();
        record_visit(&store, at(2024, 3, 5)).unwrap();
        record_search(&store, "https://a.com", DeviceType::Desktop, at(2024, 3, 5)).unwrap();

        reset_stats(&store).unwrap();

        assert!(search_log(&store).unwrap().is_empty());
        assert!(visitor_stats(&store).unwrap().is_none());
        assert!(is_admin(&store).unwrap());
    }

    #[test]
    fn test_admin_flag_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert!(!is_admin(&store).unwrap());
        set_admin(&store, true).unwrap();
        assert!(is_admin(&store).unwrap());
        set_admin(&store, false).unwrap();
        assert!(!is_admin(&store).unwrap());
    }
}
