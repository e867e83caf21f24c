//! Dashboard aggregation over vocabulary and sentence records.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::security::template_hash;
use crate::db::models::{DatasetStat, SentenceItem, SentenceProgress, User, VocabularyItem};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct VocabularyMetrics {
    pub(crate) count: usize,
    pub(crate) practiced_count: usize,
    pub(crate) coverage: f64,
    pub(crate) accuracy: f64,
}

pub(crate) fn vocabulary_metrics(items: &[VocabularyItem]) -> VocabularyMetrics {
    let count = items.len();
    let practiced_count = items.iter().filter(|item| item.total > 0).count();
    let (correct, total) = items.iter().fold((0u64, 0u64), |(correct, total), item| {
        (correct + u64::from(item.correct.min(item.total)), total + u64::from(item.total))
    });

    VocabularyMetrics {
        count,
        practiced_count,
        coverage: if count == 0 { 0.0 } else { practiced_count as f64 / count as f64 },
        accuracy: if total == 0 { 0.0 } else { correct as f64 / total as f64 },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SentenceStatus {
    NotStarted,
    InProgress,
    Done,
}

/// `None` for an item without options; such items belong to no bucket.
pub(crate) fn sentence_status(options: &[String], completed: &BTreeSet<String>) -> Option<SentenceStatus> {
    if options.is_empty() {
        return None;
    }
    let hits = options.iter().filter(|option| completed.contains(*option)).count();
    Some(if hits == options.len() {
        SentenceStatus::Done
    } else if hits > 0 {
        SentenceStatus::InProgress
    } else {
        SentenceStatus::NotStarted
    })
}

/// A user's progress records keyed by template hash.
pub(crate) struct ProgressIndex<'a> {
    by_hash: HashMap<&'a str, &'a SentenceProgress>,
}

impl<'a> ProgressIndex<'a> {
    pub(crate) fn new(records: &'a [SentenceProgress]) -> Self {
        Self { by_hash: records.iter().map(|record| (record.template_hash.as_str(), record)).collect() }
    }

    /// Completed options recorded for this item's template. A record whose stored template
    /// text differs belongs to another template with the same hash and is ignored.
    pub(crate) fn completed_for(&self, item: &SentenceItem) -> Option<&'a BTreeSet<String>> {
        let hash = template_hash(&item.template);
        let record = self.by_hash.get(hash.as_str())?;
        match &record.template {
            Some(template) if template != &item.template => None,
            _ => Some(&record.completed_options),
        }
    }

    pub(crate) fn status_of(&self, item: &SentenceItem) -> Option<SentenceStatus> {
        let empty = BTreeSet::new();
        sentence_status(&item.options, self.completed_for(item).unwrap_or(&empty))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct DatasetRollup {
    pub(crate) total_count: u32,
    pub(crate) completed_count: u32,
    pub(crate) in_progress_count: u32,
}

impl DatasetRollup {
    pub(crate) fn into_stat(self, dataset_name: impl Into<String>) -> DatasetStat {
        DatasetStat {
            dataset_name: dataset_name.into(),
            total_count: self.total_count,
            completed_count: self.completed_count,
            in_progress_count: self.in_progress_count,
            last_active: None,
        }
    }
}

/// `total_count` counts every item, including those without options.
pub(crate) fn rollup(items: &[SentenceItem], records: &[SentenceProgress]) -> DatasetRollup {
    let index = ProgressIndex::new(records);
    let mut result = DatasetRollup {
        total_count: u32::try_from(items.len()).unwrap_or(u32::MAX),
        ..DatasetRollup::default()
    };
    for item in items {
        match index.status_of(item) {
            Some(SentenceStatus::Done) => result.completed_count += 1,
            Some(SentenceStatus::InProgress) => result.in_progress_count += 1,
            Some(SentenceStatus::NotStarted) | None => {}
        }
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct StackedFractions {
    pub(crate) done: f64,
    pub(crate) in_progress: f64,
    pub(crate) remaining: f64,
}

/// `None` when there is nothing to draw.
pub(crate) fn stacked_fractions(completed: u32, in_progress: u32, total: u32) -> Option<StackedFractions> {
    if total == 0 {
        return None;
    }
    let total = f64::from(total);
    let done = (f64::from(completed) / total).clamp(0.0, 1.0);
    let in_progress = (f64::from(in_progress) / total).clamp(0.0, 1.0 - done);
    Some(StackedFractions { done, in_progress, remaining: 1.0 - (done + in_progress) })
}

/// Minimal user view the leaderboard needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct UserSummary {
    pub(crate) name: String,
    pub(crate) student_id: String,
    pub(crate) color: String,
    pub(crate) is_admin: bool,
    pub(crate) sentence_stats: BTreeMap<String, DatasetStat>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            student_id: user.student_id,
            color: user.color,
            is_admin: user.is_admin,
            sentence_stats: user.sentence_stats,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct LeaderboardEntry {
    pub(crate) name: String,
    pub(crate) color: String,
    pub(crate) completed_count: u32,
    pub(crate) in_progress_count: u32,
    pub(crate) total_count: u32,
    pub(crate) last_active: Option<String>,
    pub(crate) fractions: Option<StackedFractions>,
}

/// Every user's stat for the dataset, zero-filled when absent. Sorted by completed (desc),
/// in progress (desc), then name.
pub(crate) fn leaderboard(users: &[UserSummary], dataset_id: &str) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = users
        .iter()
        .map(|user| {
            let stat = user.sentence_stats.get(dataset_id);
            let completed_count = stat.map_or(0, |stat| stat.completed_count);
            let in_progress_count = stat.map_or(0, |stat| stat.in_progress_count);
            let total_count = stat.map_or(0, |stat| stat.total_count);
            LeaderboardEntry {
                name: user.name.clone(),
                color: user.color.clone(),
                completed_count,
                in_progress_count,
                total_count,
                last_active: stat.and_then(|stat| stat.last_active.clone()),
                fractions: stacked_fractions(completed_count, in_progress_count, total_count),
            }
        })
        .collect();
    entries.sort_by(|a, b| {
        b.completed_count
            .cmp(&a.completed_count)
            .then_with(|| b.in_progress_count.cmp(&a.in_progress_count))
            .then_with(|| a.name.cmp(&b.name))
    });
    entries
}
