use std::cmp::Ordering;
use std::collections::VecDeque;
use std::time::SystemTime;

use super::state::StrategyState;
use super::ActivationReason;
use crate::job::Job;
use crate::requirements::RequirementsChecker;
use crate::tape::TapeState;

/// 次にアクティブ化するテープを選択する.
///
/// 候補となるのは、キューイング中のジョブを持ち、かつアクティブではないテープ群.
/// 以下の規則を順番に適用し、最初に該当したテープを返す:
///
/// 1. 最古のジョブが最大待機時間を超えているテープの中で、最古のジョブが最も古いもの
/// 2. (以降は、最新のジョブが最小待機時間を経過しているテープのみが対象)
///    リコール量が十分なテープの中で、リコール量が最大のもの
/// 3. キューの長さの閾値が設定されている場合には、最長のキューを持つテープ(ただし閾値以上の場合のみ)
///
/// 同順位の場合には最古のジョブがより古いテープが、それも同じならば名前が小さいテープが優先される.
pub(crate) fn select_next_tape(
    state: &StrategyState,
    checker: &RequirementsChecker,
    now: SystemTime,
) -> Option<(String, ActivationReason)> {
    let candidates = state
        .queued
        .iter()
        .filter(|(name, jobs)| !jobs.is_empty() && !state.active.contains_key(*name))
        .filter_map(|(name, jobs)| {
            state.tapes.get(name).map(|tape| Candidate { name, tape, jobs })
        })
        .collect::<Vec<_>>();
    if candidates.is_empty() {
        return None;
    }

    if let Some(c) = candidates
        .iter()
        .filter(|c| checker.is_oldest_tape_job_expired(c.tape, now))
        .min_by(|a, b| older_first(checker, a, b))
    {
        return Some((c.name.clone(), ActivationReason::Expired));
    }

    let cooled = candidates
        .into_iter()
        .filter(|c| checker.is_newest_tape_job_old_enough(c.tape, now))
        .collect::<Vec<_>>();
    if cooled.is_empty() {
        return None;
    }

    if let Some((c, _)) = cooled
        .iter()
        .map(|c| (c, c.recall_volume()))
        .filter(|(c, volume)| checker.is_tape_recall_volume_sufficient(c.tape, *volume))
        .min_by(|a, b| b.1.cmp(&a.1).then_with(|| older_first(checker, a.0, b.0)))
    {
        return Some((c.name.clone(), ActivationReason::RecallVolume));
    }

    if !checker.has_min_request_count() {
        return None;
    }
    cooled
        .iter()
        .min_by(|a, b| {
            b.jobs
                .len()
                .cmp(&a.jobs.len())
                .then_with(|| older_first(checker, a, b))
        })
        .filter(|c| checker.is_request_count_sufficient(c.jobs.len()))
        .map(|c| (c.name.clone(), ActivationReason::QueueLength))
}

struct Candidate<'a> {
    name: &'a String,
    tape: &'a TapeState,
    jobs: &'a VecDeque<Job>,
}
impl<'a> Candidate<'a> {
    /// サイズが判明しているジョブ群の合計サイズ.
    fn recall_volume(&self) -> u64 {
        self.jobs
            .iter()
            .filter_map(Job::file_size)
            .fold(0u64, |acc, size| acc.saturating_add(size))
    }
}

fn older_first(checker: &RequirementsChecker, a: &Candidate, b: &Candidate) -> Ordering {
    checker
        .compare_oldest_tape_job_age(a.tape, b.tape)
        .then_with(|| a.name.cmp(b.name))
}
