//! Aggregate statistics over a [`MailboxSnapshot`].

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::model::address::domain_of;
use crate::model::record::{FolderName, MessageRecord};
use crate::model::snapshot::MailboxSnapshot;

/// Default length of the sender ranking.
pub const DEFAULT_TOP_SENDERS: usize = 50;
/// Default length of the domain ranking.
pub const DEFAULT_TOP_DOMAINS: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total_emails: usize,
    pub folder_counts: BTreeMap<FolderName, usize>,
    pub date_range: DateRange,
    pub top_senders: Vec<SenderCount>,
    pub top_domains: Vec<DomainCount>,
}

/// Oldest and newest parseable dates; both `None` when there are none.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateRange {
    pub first: Option<String>,
    pub last: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderCount {
    pub email: String,
    /// Display name from the last message seen from this address.
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainCount {
    pub domain: String,
    pub count: usize,
}

/// Compute statistics with the default ranking lengths.
pub fn compute(snapshot: &MailboxSnapshot) -> Stats {
    compute_with_limits(snapshot, DEFAULT_TOP_SENDERS, DEFAULT_TOP_DOMAINS)
}

pub fn compute_with_limits(
    snapshot: &MailboxSnapshot,
    top_senders: usize,
    top_domains: usize,
) -> Stats {
    let folder_counts = snapshot
        .iter_folders()
        .map(|(folder, records)| (folder.clone(), records.len()))
        .collect();

    let counts = count_senders(snapshot.messages());
    let mut domains = rank_domains(&counts);
    domains.truncate(top_domains);

    let mut senders = sort_by_count(counts);
    senders.truncate(top_senders);

    Stats {
        total_emails: snapshot.messages().len(),
        folder_counts,
        date_range: date_range(snapshot.messages()),
        top_senders: senders,
        top_domains: domains,
    }
}

/// Range over the dates that re-parse as RFC 3339; raw fallback strings are skipped.
pub fn date_range(messages: &[MessageRecord]) -> DateRange {
    let mut min: Option<DateTime<FixedOffset>> = None;
    let mut max: Option<DateTime<FixedOffset>> = None;

    for dt in messages
        .iter()
        .filter_map(|m| DateTime::parse_from_rfc3339(&m.date).ok())
    {
        if min.map_or(true, |m| dt < m) {
            min = Some(dt);
        }
        if max.map_or(true, |m| dt > m) {
            max = Some(dt);
        }
    }

    DateRange {
        first: min.map(|d| d.to_rfc3339()),
        last: max.map(|d| d.to_rfc3339()),
    }
}

/// Per-address counts in order of first appearance.
pub fn count_senders(messages: &[MessageRecord]) -> Vec<SenderCount> {
    let mut ranking: Vec<SenderCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for m in messages {
        match index.get(m.from_email.as_str()) {
            Some(&i) => {
                ranking[i].count += 1;
                ranking[i].name.clone_from(&m.from_name);
            }
            None => {
                index.insert(&m.from_email, ranking.len());
                ranking.push(SenderCount {
                    email: m.from_email.clone(),
                    name: m.from_name.clone(),
                    count: 1,
                });
            }
        }
    }

    ranking
}

fn sort_by_count(mut senders: Vec<SenderCount>) -> Vec<SenderCount> {
    // `sort_by` is stable, so equal counts keep encounter order.
    senders.sort_by(|a, b| b.count.cmp(&a.count));
    senders
}

/// Domain ranking derived from an encounter-ordered sender list
/// (see [`count_senders`]).
///
/// Domains are taken verbatim after `@`; addresses without one are ignored.
pub fn rank_domains(senders: &[SenderCount]) -> Vec<DomainCount> {
    let mut ranking: Vec<DomainCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for s in senders {
        let Some(domain) = domain_of(&s.email) else {
            continue;
        };
        match index.get(domain) {
            Some(&i) => ranking[i].count += s.count,
            None => {
                index.insert(domain, ranking.len());
                ranking.push(DomainCount {
                    domain: domain.to_string(),
                    count: s.count,
                });
            }
        }
    }

    ranking.sort_by(|a, b| b.count.cmp(&a.count));
    ranking
}
