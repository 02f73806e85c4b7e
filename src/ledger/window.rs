//! Resolution of relative time expressions into absolute epoch windows.
//!
//! Month and day boundaries are computed in a fixed civil time zone so that
//! "this month" means the same thing to the user regardless of where the
//! service runs.

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Upper bound of the all-time sentinel window.
pub const ALL_TIME_END: i64 = 9_999_999_999;

/// Half-open epoch-second interval `[start, end)` with a display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
    pub label: String,
}

impl TimeWindow {
    pub fn contains(&self, epoch: i64) -> bool {
        self.start <= epoch && epoch < self.end
    }
}

/// A relative window as requested by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSpec {
    Month,
    LastDays(u32),
}

impl WindowSpec {
    /// Parse a window token: `mes`, `7`, `15` or `30`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "mes" => Some(Self::Month),
            "7" => Some(Self::LastDays(7)),
            "15" => Some(Self::LastDays(15)),
            "30" => Some(Self::LastDays(30)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WindowResolver {
    tz: Tz,
}

impl WindowResolver {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn resolve(&self, spec: WindowSpec) -> TimeWindow {
        self.resolve_at(spec, Utc::now())
    }

    pub fn resolve_at(&self, spec: WindowSpec, now: DateTime<Utc>) -> TimeWindow {
        match spec {
            WindowSpec::Month => self.month_window_at(now),
            WindowSpec::LastDays(n) => self.last_n_days_window_at(n, now),
        }
    }

    pub fn month_window(&self) -> TimeWindow {
        self.month_window_at(Utc::now())
    }

    pub fn month_window_at(&self, now: DateTime<Utc>) -> TimeWindow {
        let local = now.with_timezone(&self.tz);
        let (year, month) = (local.year(), local.month());
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };

        let start = self.local_midnight(year, month);
        let end = self.local_midnight(next_year, next_month);

        TimeWindow {
            start: start.timestamp(),
            end: end.timestamp(),
            label: format!("Mes actual ({})", start.format("%Y-%m")),
        }
    }

    pub fn last_n_days_window(&self, n: u32) -> TimeWindow {
        self.last_n_days_window_at(n, Utc::now())
    }

    /// `[now - n days, now)`; the start is truncated to the minute, the end
    /// keeps second precision. Days are calendar days in the reference zone,
    /// so the start keeps the local wall-clock time across DST changes.
    pub fn last_n_days_window_at(&self, n: u32, now: DateTime<Utc>) -> TimeWindow {
        let now_local = now.with_timezone(&self.tz);
        let end = now_local.timestamp();
        let start_local = now_local
            .naive_local()
            .checked_sub_days(Days::new(u64::from(n)))
            .and_then(|naive| self.tz.from_local_datetime(&naive).earliest())
            // Wall-clock start inside a DST gap: fall back to elapsed days.
            .unwrap_or_else(|| now_local - Duration::days(i64::from(n)));
        let start = start_local.timestamp() - i64::from(start_local.second());

        TimeWindow {
            start,
            end,
            label: format!("Últimos {n} días"),
        }
    }

    pub fn all_time_window(&self) -> TimeWindow {
        TimeWindow {
            start: 0,
            end: ALL_TIME_END,
            label: "Todo el historial".to_string(),
        }
    }

    /// First instant of the given civil month in the reference zone.
    fn local_midnight(&self, year: i32, month: u32) -> DateTime<Tz> {
        let naive = NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        // Zones whose DST gap swallows midnight have no local 00:00.
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .unwrap_or_else(|| self.tz.from_utc_datetime(&naive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ny() -> WindowResolver {
        WindowResolver::new(chrono_tz::America::New_York)
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_month_window_november() {
        let w = ny().month_window_at(utc(2025, 11, 15, 12, 0, 0));
        // 2025-11-01 00:00 EDT
        assert_eq!(w.start, utc(2025, 11, 1, 4, 0, 0).timestamp());
        // 2025-12-01 00:00 EST
        assert_eq!(w.end, utc(2025, 12, 1, 5, 0, 0).timestamp());
        // 30 days plus the hour gained when DST ends.
        assert_eq!(w.end - w.start, 30 * 86_400 + 3_600);
        assert_eq!(w.label, "Mes actual (2025-11)");
    }

    #[test]
    fn test_month_window_december_rolls_over() {
        let w = ny().month_window_at(utc(2025, 12, 31, 20, 0, 0));
        assert_eq!(w.start, utc(2025, 12, 1, 5, 0, 0).timestamp());
        assert_eq!(w.end, utc(2026, 1, 1, 5, 0, 0).timestamp());
        assert_eq!(w.end - w.start, 31 * 86_400);
        assert_eq!(w.label, "Mes actual (2025-12)");
    }

    #[test]
    fn test_month_uses_local_calendar_not_utc() {
        // 2026-01-01 02:00 UTC is still Dec 31 in New York.
        let w = ny().month_window_at(utc(2026, 1, 1, 2, 0, 0));
        assert_eq!(w.label, "Mes actual (2025-12)");
        assert!(w.contains(utc(2026, 1, 1, 2, 0, 0).timestamp()));
    }

    #[test]
    fn test_last_n_days_window() {
        let now = utc(2025, 6, 20, 15, 30, 45);
        let w = ny().last_n_days_window_at(7, now);
        assert_eq!(w.end, now.timestamp());
        assert_eq!(w.start, utc(2025, 6, 13, 15, 30, 0).timestamp());
        assert_eq!(w.label, "Últimos 7 días");
        assert!(!w.contains(w.end));
        assert!(w.contains(w.start));
    }

    #[test]
    fn test_last_n_days_keeps_wall_clock_across_dst() {
        // 2025-11-05 10:30:45 EST; seven calendar days earlier is
        // 2025-10-29 10:30:45 EDT, one hour more than 7 * 24h back.
        let now = utc(2025, 11, 5, 15, 30, 45);
        let w = ny().last_n_days_window_at(7, now);
        assert_eq!(w.start, utc(2025, 10, 29, 14, 30, 0).timestamp());
        assert_eq!(w.start, 1_761_748_200);
        assert_eq!(w.end - w.start, 7 * 86_400 + 3_600 + 45);
    }

    #[test]
    fn test_last_n_days_start_in_dst_gap() {
        // 2025-03-16 02:30 EDT minus 7 days is 2025-03-09 02:30, which does
        // not exist in New York.
        let now = utc(2025, 3, 16, 6, 30, 0);
        let w = ny().last_n_days_window_at(7, now);
        assert_eq!(w.start, now.timestamp() - 7 * 86_400);
    }

    #[test]
    fn test_all_time_window() {
        let w = ny().all_time_window();
        assert_eq!((w.start, w.end), (0, ALL_TIME_END));
    }

    #[test]
    fn test_window_tokens() {
        assert_eq!(WindowSpec::from_token("mes"), Some(WindowSpec::Month));
        assert_eq!(WindowSpec::from_token("15"), Some(WindowSpec::LastDays(15)));
        assert_eq!(WindowSpec::from_token("14"), None);
        assert_eq!(WindowSpec::from_token("semana"), None);
    }
}
