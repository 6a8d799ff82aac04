use anyhow::bail;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::warn;

use crate::{ledger::Ledger, loader::LoadedPost};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Eligibility {
    Eligible,
    AlreadyPublished,
    /// `pubDate` lies after the run's "now".
    Scheduled(DateTime<Utc>),
}

/// A post is published when it is not in the ledger and is not dated in the future.
/// Missing or unparseable dates never block publishing.
pub(crate) fn check(post: &LoadedPost, ledger: &Ledger, now: DateTime<Utc>) -> Eligibility {
    if ledger.contains(&post.id) {
        return Eligibility::AlreadyPublished;
    }

    match post.meta.pub_date.as_deref().map(parse_pub_date) {
        Some(Ok(date)) if date > now => Eligibility::Scheduled(date),
        Some(Err(e)) => {
            warn!("{}: {e:#}. treating as due...", post.id);
            Eligibility::Eligible
        }
        _ => Eligibility::Eligible,
    }
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%b %d %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Naive values are taken as UTC; bare dates as midnight UTC.
pub(crate) fn parse_pub_date(value: &str) -> anyhow::Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Ok(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Ok(date.with_timezone(&Utc));
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(date) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(date.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(date.and_time(NaiveTime::MIN).and_utc());
        }
    }

    bail!("Invalid pubDate: {value:?}")
}
