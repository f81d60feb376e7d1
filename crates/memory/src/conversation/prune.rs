//! Line filtering for log pruning.
//!
//! Works on the raw text so that kept lines keep their exact bytes,
//! terminators included.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{MemoryError, Result};

/// Timestamp format written by `append`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which lines of a log survive a prune.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneFilter {
    pub keep_lines: Option<usize>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl PruneFilter {
    /// Build a filter from caller-supplied date strings.
    pub fn parse(
        keep_lines: Option<usize>,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            keep_lines,
            start_date: start_date.map(|raw| parse_bound("start_date", raw)).transpose()?,
            end_date: end_date.map(|raw| parse_bound("end_date", raw)).transpose()?,
        })
    }

    pub fn is_noop(&self) -> bool {
        self.keep_lines.is_none() && self.start_date.is_none() && self.end_date.is_none()
    }

    /// Apply the filter to `content`, returning the surviving text.
    ///
    /// `keep_lines` takes precedence: when set, date bounds are ignored.
    pub fn apply<'a>(&self, content: &'a str) -> Filtered<'a> {
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let total = lines.len();

        let kept: Vec<&str> = if let Some(keep) = self.keep_lines {
            lines[total.saturating_sub(keep)..].to_vec()
        } else if self.start_date.is_some() || self.end_date.is_some() {
            lines.into_iter().filter(|line| self.in_range(line)).collect()
        } else {
            lines
        };

        Filtered { total, kept }
    }

    /// Lines without a parseable timestamp are always in range.
    fn in_range(&self, line: &str) -> bool {
        let Some(date) = line_date(line) else {
            return true;
        };
        self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
    }
}

#[derive(Debug)]
pub struct Filtered<'a> {
    pub total: usize,
    pub kept: Vec<&'a str>,
}

impl Filtered<'_> {
    pub fn removed(&self) -> usize {
        self.total - self.kept.len()
    }

    pub fn into_text(self) -> String {
        self.kept.concat()
    }
}

fn timestamp_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[(\d{4}-\d{2}-\d{2})[ T]\d{2}:\d{2}:\d{2}\]")
            .expect("timestamp pattern is valid")
    })
}

/// Date portion of a `[YYYY-MM-DD HH:MM:SS]` line prefix, if any.
pub fn line_date(line: &str) -> Option<NaiveDate> {
    let captures = timestamp_prefix().captures(line)?;
    NaiveDate::parse_from_str(captures.get(1)?.as_str(), "%Y-%m-%d").ok()
}

/// Accept `YYYY-MM-DD`, optionally followed by a time which is ignored.
fn parse_bound(field: &str, raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    let rest = trimmed.get(10..).unwrap_or("");
    let time_ok = rest.is_empty()
        || rest
            .strip_prefix([' ', 'T'])
            .is_some_and(|time| chrono::NaiveTime::parse_from_str(time, "%H:%M:%S").is_ok());

    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(date) if time_ok => Ok(date),
        _ => Err(MemoryError::invalid(
            "prune_conversation",
            format!("{field} '{raw}' is not YYYY-MM-DD or YYYY-MM-DD HH:MM:SS"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "[2024-01-01 09:00:00] new year\n\
                       plain note\n\
                       [2024-01-15 12:30:00] mid month\n\
                       [2024-02-01 00:00:01] february\n";

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn keep_lines_keeps_tail_in_order() {
        let filter = PruneFilter { keep_lines: Some(2), ..Default::default() };
        let out = filter.apply(LOG);
        assert_eq!(out.removed(), 2);
        assert_eq!(
            out.into_text(),
            "[2024-01-15 12:30:00] mid month\n[2024-02-01 00:00:01] february\n"
        );
    }

    #[test]
    fn keep_lines_at_or_above_total_is_identity() {
        for keep in [4, 5, 100] {
            let filter = PruneFilter { keep_lines: Some(keep), ..Default::default() };
            assert_eq!(filter.apply(LOG).into_text(), LOG);
        }
    }

    #[test]
    fn keep_zero_empties() {
        let filter = PruneFilter { keep_lines: Some(0), ..Default::default() };
        let out = filter.apply(LOG);
        assert_eq!(out.removed(), 4);
        assert_eq!(out.into_text(), "");
    }

    #[test]
    fn keep_lines_overrides_dates() {
        let filter = PruneFilter {
            keep_lines: Some(1),
            start_date: Some(date("2030-01-01")),
            end_date: None,
        };
        assert_eq!(filter.apply(LOG).into_text(), "[2024-02-01 00:00:01] february\n");
    }

    #[test]
    fn date_range_is_inclusive_and_keeps_untimestamped() {
        let filter = PruneFilter {
            keep_lines: None,
            start_date: Some(date("2024-01-15")),
            end_date: Some(date("2024-01-15")),
        };
        assert_eq!(
            filter.apply(LOG).into_text(),
            "plain note\n[2024-01-15 12:30:00] mid month\n"
        );
    }

    #[test]
    fn open_ended_ranges() {
        let from = PruneFilter { start_date: Some(date("2024-01-15")), ..Default::default() };
        assert_eq!(
            from.apply(LOG).into_text(),
            "plain note\n[2024-01-15 12:30:00] mid month\n[2024-02-01 00:00:01] february\n"
        );
        let until = PruneFilter { end_date: Some(date("2024-01-01")), ..Default::default() };
        assert_eq!(until.apply(LOG).into_text(), "[2024-01-01 09:00:00] new year\nplain note\n");
    }

    #[test]
    fn untimestamped_log_survives_any_range() {
        let log = "hello\nworld\n\n";
        let filter = PruneFilter {
            keep_lines: None,
            start_date: Some(date("2000-01-01")),
            end_date: Some(date("2000-01-02")),
        };
        assert_eq!(filter.apply(log).into_text(), log);
    }

    #[test]
    fn missing_trailing_newline_is_preserved() {
        let log = "a\nb";
        let filter = PruneFilter { keep_lines: Some(1), ..Default::default() };
        assert_eq!(filter.apply(log).into_text(), "b");
    }

    #[test]
    fn line_date_recognises_prefix_only() {
        assert_eq!(line_date("[2024-03-04 05:06:07] hi"), Some(date("2024-03-04")));
        assert_eq!(line_date("[2024-03-04T05:06:07] hi"), Some(date("2024-03-04")));
        assert_eq!(line_date("hi [2024-03-04 05:06:07]"), None);
        assert_eq!(line_date("[2024-13-40 05:06:07] bad date"), None);
        assert_eq!(line_date("[note] hi"), None);
    }

    #[test]
    fn parse_accepts_date_and_datetime_bounds() {
        let filter = PruneFilter::parse(None, Some("2024-01-02"), Some("2024-01-03 23:59:59")).unwrap();
        assert_eq!(filter.start_date, Some(date("2024-01-02")));
        assert_eq!(filter.end_date, Some(date("2024-01-03")));
        assert!(!filter.is_noop());
        assert!(PruneFilter::parse(None, None, None).unwrap().is_noop());
    }

    #[test]
    fn parse_rejects_garbage_dates() {
        for bad in ["yesterday", "2024/01/02", "2024-01-02 noon", "2024-02-30"] {
            assert!(PruneFilter::parse(None, Some(bad), None).is_err(), "{bad}");
        }
    }
}
