use std::collections::{BTreeMap, HashMap, VecDeque};
use std::mem;
use std::time::{Duration, SystemTime};

use super::selection;
use super::{ActivationReason, QueueSnapshot};
use crate::job::{FileId, Job, JobId};
use crate::requirements::RequirementsChecker;
use crate::tape::{FileInfo, TapeInfo, TapeState};

/// スケジューリング戦略の内部状態.
///
/// 各ジョブは、常に以下のいずれか一つのキューにのみ存在する:
///
/// - `new_jobs`: テープが未判明
/// - `queued`: テープは判明しているが、そのテープはアクティブではない
/// - `active`: テープがアクティブで、順番待ちをしている
/// - `immediate`: 払い出し待ち
#[derive(Debug, Default)]
pub(crate) struct StrategyState {
    pub(super) tapes: BTreeMap<String, TapeState>,
    pub(super) new_jobs: Vec<Job>,
    pub(super) queued: BTreeMap<String, VecDeque<Job>>,
    pub(super) active: BTreeMap<String, VecDeque<Job>>,
    pub(super) immediate: VecDeque<JobId>,
    last_refresh: Option<SystemTime>,
}
impl StrategyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, job: Job) {
        self.new_jobs.push(job);
    }

    pub fn len(&self) -> usize {
        self.new_jobs.len()
            + count_jobs(&self.queued)
            + count_jobs(&self.active)
            + self.immediate.len()
    }

    pub fn active_tapes(&self) -> usize {
        self.active.len()
    }

    /// リフレッシュの時期であれば、その時刻を記録した上で`true`を返す.
    ///
    /// 時計が前回のリフレッシュ時刻よりも巻き戻っている場合も、リフレッシュの時期とみなす.
    pub fn claim_refresh(&mut self, now: SystemTime, interval: Duration) -> bool {
        let due = self.last_refresh.map_or(true, |last| {
            now.duration_since(last).map_or(true, |elapsed| elapsed >= interval)
        });
        if due {
            self.last_refresh = Some(now);
        }
        due
    }

    /// テープが未判明のジョブ群のファイルIDを返し、各ジョブを「問い合わせ済み」とする.
    pub fn prepare_file_lookup(&mut self) -> Vec<FileId> {
        let mut file_ids = Vec::with_capacity(self.new_jobs.len());
        for job in &mut self.new_jobs {
            job.mark_tape_info_requested();
            file_ids.push(job.file_id().clone());
        }
        file_ids.sort();
        file_ids.dedup();
        file_ids
    }

    /// 取得したファイルの位置情報を反映し、テープが判明したジョブ群をテープ毎のキューに移す.
    ///
    /// 移したジョブの数を返す.
    pub fn apply_file_infos(&mut self, infos: &HashMap<FileId, FileInfo>) -> usize {
        let mut resolved = 0;
        let mut unresolved = Vec::with_capacity(self.new_jobs.len());
        for mut job in mem::take(&mut self.new_jobs) {
            match infos.get(job.file_id()) {
                Some(info) if !info.tape_name.is_empty() => {
                    job.set_file_size(info.file_size);
                    self.enqueue_by_tape(job, &info.tape_name);
                    resolved += 1;
                }
                _ => unresolved.push(job),
            }
        }
        self.new_jobs = unresolved;
        resolved
    }

    /// 容量情報を持たないテープ群を返す.
    pub fn tapes_without_info(&self) -> Vec<String> {
        self.tapes
            .iter()
            .filter(|(_, t)| !t.has_tape_info())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// 取得したテープの容量情報を反映する.
    ///
    /// 追跡対象外のテープの情報は無視される.
    pub fn apply_tape_infos(&mut self, infos: &HashMap<String, TapeInfo>) {
        for (name, info) in infos {
            if let Some(tape) = self.tapes.get_mut(name) {
                tape.set_tape_info(*info);
            }
        }
    }

    /// 空いているスロットがある限り、テープをアクティブ化する.
    ///
    /// アクティブ化したテープと、そのジョブ数および選択理由を返す.
    pub fn refill_active_tape_slots(
        &mut self,
        checker: &RequirementsChecker,
        now: SystemTime,
    ) -> Vec<(String, usize, ActivationReason)> {
        let mut activated = Vec::new();
        while !self.queued.is_empty() && checker.remaining_tape_slots(self.active.len()) > 0 {
            let (tape, reason) = match selection::select_next_tape(self, checker, now) {
                None => break,
                Some(selected) => selected,
            };
            let jobs = self.activate(&tape);
            activated.push((tape, jobs, reason));
        }
        activated
    }

    pub fn is_immediate_queue_empty(&self) -> bool {
        self.immediate.is_empty()
    }

    /// テープ情報の問い合わせ済みで、最大待機時間を超えたテープ未判明のジョブ群を即時キューに移す.
    ///
    /// 移したジョブの数を返す.
    pub fn move_expired_jobs(&mut self, checker: &RequirementsChecker, now: SystemTime) -> usize {
        let (mut expired, remaining): (Vec<Job>, Vec<Job>) = self
            .new_jobs
            .drain(..)
            .partition(|j| j.tape_info_requested() && checker.is_job_expired(j, now));
        self.new_jobs = remaining;
        expired.sort_by_key(|j| j.creation_time());
        let n = expired.len();
        self.immediate
            .extend(expired.into_iter().map(|j| j.id().clone()));
        n
    }

    /// アクティブな各テープから先頭のジョブを一つずつ取り出し、生成時刻順に即時キューへ移す.
    ///
    /// ジョブが無くなったテープは非アクティブ化され、
    /// 他にそのテープを対象とするジョブが無ければ追跡対象からも外される.
    ///
    /// 非アクティブ化されたテープ群を返す.
    pub fn move_next_tape_jobs(&mut self) -> Vec<String> {
        let mut popped = Vec::with_capacity(self.active.len());
        let mut drained = Vec::new();
        for (tape, jobs) in &mut self.active {
            if let Some(job) = jobs.pop_front() {
                popped.push(job);
            }
            if jobs.is_empty() {
                drained.push(tape.clone());
            }
        }
        for tape in &drained {
            self.active.remove(tape);
            match self.queued.get(tape) {
                Some(jobs) => {
                    let oldest = jobs.front().map(Job::creation_time);
                    let newest = jobs.back().map(Job::creation_time);
                    if let Some(state) = self.tapes.get_mut(tape) {
                        state.reset_job_arrivals(oldest, newest);
                    }
                }
                None => {
                    self.tapes.remove(tape);
                }
            }
        }
        popped.sort_by_key(|j| j.creation_time());
        self.immediate
            .extend(popped.into_iter().map(|j| j.id().clone()));
        drained
    }

    pub fn pop_immediate(&mut self) -> Option<JobId> {
        self.immediate.pop_front()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            new_jobs: self.new_jobs.len(),
            queued_jobs: count_jobs(&self.queued),
            active_jobs: count_jobs(&self.active),
            immediate_jobs: self.immediate.len(),
            pending_tapes: per_tape(&self.queued),
            active_tapes: per_tape(&self.active),
        }
    }

    /// ジョブをテープのキューに、生成時刻順を保つように追加する.
    ///
    /// 同じ生成時刻のジョブ同士は到着順となる.
    fn enqueue_by_tape(&mut self, job: Job, tape: &str) {
        self.tapes
            .entry(tape.to_owned())
            .or_insert_with(TapeState::new)
            .record_job_arrival(job.creation_time());
        let jobs = self.queued.entry(tape.to_owned()).or_insert_with(VecDeque::new);
        if jobs.back().map_or(true, |last| last.creation_time() <= job.creation_time()) {
            jobs.push_back(job);
        } else {
            let pos = jobs.partition_point(|j| j.creation_time() <= job.creation_time());
            jobs.insert(pos, job);
        }
    }

    /// テープのキューをアクティブなキューへ移し、移したジョブの数を返す.
    fn activate(&mut self, tape: &str) -> usize {
        let jobs = self.queued.remove(tape).unwrap_or_default();
        let n = jobs.len();
        if let Some(state) = self.tapes.get_mut(tape) {
            state.clear_job_arrivals();
        }
        let active = self.active.entry(tape.to_owned()).or_insert_with(VecDeque::new);
        active.extend(jobs);
        active
            .make_contiguous()
            .sort_by_key(|j| j.creation_time());
        n
    }
}

fn count_jobs(queues: &BTreeMap<String, VecDeque<Job>>) -> usize {
    queues.values().map(VecDeque::len).sum()
}

fn per_tape(queues: &BTreeMap<String, VecDeque<Job>>) -> Vec<(String, usize)> {
    queues
        .iter()
        .map(|(tape, jobs)| (tape.clone(), jobs.len()))
        .collect()
}

#[cfg(test)]
mod tests {
    use trackable::result::TestResult;

    use super::*;
    use crate::requirements::RequirementsCheckerBuilder;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn job(id: &str, secs: u64) -> Job {
        Job::new(JobId::new(id, FileId::new(format!("file{}", id))), at(secs))
    }

    fn infos(entries: &[(&str, u64, &str)]) -> HashMap<FileId, FileInfo> {
        entries
            .iter()
            .map(|&(id, size, tape)| {
                (FileId::new(format!("file{}", id)), FileInfo::new(size, tape))
            })
            .collect()
    }

    #[test]
    fn refresh_is_rate_limited() {
        let mut state = StrategyState::new();
        let interval = Duration::from_secs(60);
        assert!(state.claim_refresh(at(100), interval));
        assert!(!state.claim_refresh(at(159), interval));
        assert!(state.claim_refresh(at(160), interval));

        // 時計の巻き戻り
        assert!(state.claim_refresh(at(100), interval));
        assert!(!state.claim_refresh(at(130), interval));
        assert!(state.claim_refresh(at(160), interval));
    }

    #[test]
    fn resolved_jobs_are_queued_by_creation_time() {
        let mut state = StrategyState::new();
        state.add(job("2", 20));
        state.add(job("1", 10));
        state.add(job("3", 30));
        state.add(job("9", 5));

        let ids = state.prepare_file_lookup();
        assert_eq!(ids.len(), 4);
        assert!(state.new_jobs.iter().all(Job::tape_info_requested));

        let resolved =
            state.apply_file_infos(&infos(&[("1", 1, "t1"), ("2", 2, "t1"), ("3", 3, "")]));
        assert_eq!(resolved, 2);
        assert_eq!(state.new_jobs.len(), 2); // "3"(テープ名が空)と"9"(情報なし)
        assert_eq!(state.len(), 4);

        let queue = &state.queued["t1"];
        assert_eq!(queue[0].id().request_id(), "1");
        assert_eq!(queue[1].id().request_id(), "2");
        assert_eq!(queue[0].file_size(), Some(1));

        let tape = &state.tapes["t1"];
        assert_eq!(tape.oldest_job_arrival(), Some(at(10)));
        assert_eq!(tape.newest_job_arrival(), Some(at(20)));
        assert_eq!(state.tapes_without_info(), vec!["t1".to_owned()]);

        let mut tape_infos = HashMap::new();
        tape_infos.insert("t1".to_owned(), TapeInfo::new(100, 10));
        tape_infos.insert("unknown".to_owned(), TapeInfo::new(100, 10));
        state.apply_tape_infos(&tape_infos);
        assert!(state.tapes_without_info().is_empty());
        assert!(!state.tapes.contains_key("unknown"));
    }

    #[test]
    fn large_batches_are_queued_in_order() {
        let mut state = StrategyState::new();
        let n = 50_000;
        for i in 0..n {
            state.add(job(&i.to_string(), i));
        }
        // 生成時刻が古いジョブが後から到着する
        state.add(job("late", 0));
        state.add(job("middle", n / 2));
        state.prepare_file_lookup();

        let mut file_infos = HashMap::with_capacity(state.new_jobs.len());
        for j in &state.new_jobs {
            file_infos.insert(j.file_id().clone(), FileInfo::new(1, "t1"));
        }
        assert_eq!(state.apply_file_infos(&file_infos), n as usize + 2);

        let queue = &state.queued["t1"];
        assert_eq!(queue.len(), n as usize + 2);
        assert!(queue
            .iter()
            .zip(queue.iter().skip(1))
            .all(|(a, b)| a.creation_time() <= b.creation_time()));
        assert_eq!(queue[0].id().request_id(), "0");
        assert_eq!(queue[1].id().request_id(), "late");
        let middle = (n / 2) as usize;
        assert_eq!(queue[middle + 1].id().request_id(), (n / 2).to_string());
        assert_eq!(queue[middle + 2].id().request_id(), "middle");
    }

    #[test]
    fn drained_tapes_are_forgotten() -> TestResult {
        let checker = track!(RequirementsCheckerBuilder::new()
            .min_job_waiting_time(Duration::from_secs(0))
            .min_requests_for_tape_selection(Some(1))
            .finish())?;
        let mut state = StrategyState::new();
        state.add(job("1", 10));
        state.add(job("2", 20));
        state.prepare_file_lookup();
        state.apply_file_infos(&infos(&[("1", 1, "t1"), ("2", 1, "t1")]));

        let activated = state.refill_active_tape_slots(&checker, at(100));
        assert_eq!(activated, vec![("t1".to_owned(), 2, ActivationReason::QueueLength)]);
        assert!(state.queued.is_empty());
        assert_eq!(state.tapes["t1"].oldest_job_arrival(), None);

        assert!(state.move_next_tape_jobs().is_empty());
        assert_eq!(state.move_next_tape_jobs(), vec!["t1".to_owned()]);
        assert!(state.tapes.is_empty());
        assert_eq!(state.active_tapes(), 0);
        assert_eq!(state.pop_immediate().map(|id| id.to_string()), Some("1:file1".to_owned()));
        assert_eq!(state.pop_immediate().map(|id| id.to_string()), Some("2:file2".to_owned()));
        assert_eq!(state.len(), 0);
        Ok(())
    }

    #[test]
    fn drained_tape_with_pending_jobs_keeps_arrivals() -> TestResult {
        let checker = track!(RequirementsCheckerBuilder::new()
            .min_job_waiting_time(Duration::from_secs(0))
            .min_requests_for_tape_selection(Some(1))
            .finish())?;
        let mut state = StrategyState::new();
        state.add(job("1", 10));
        state.prepare_file_lookup();
        state.apply_file_infos(&infos(&[("1", 1, "t1")]));
        state.refill_active_tape_slots(&checker, at(100));

        // アクティブ中に同じテープ宛のジョブが判明する
        state.add(job("2", 50));
        state.prepare_file_lookup();
        state.apply_file_infos(&infos(&[("2", 1, "t1")]));

        assert_eq!(state.move_next_tape_jobs(), vec!["t1".to_owned()]);
        let tape = &state.tapes["t1"];
        assert_eq!(tape.oldest_job_arrival(), Some(at(50)));
        assert_eq!(tape.newest_job_arrival(), Some(at(50)));
        assert_eq!(state.queued["t1"].len(), 1);
        Ok(())
    }

    #[test]
    fn only_requested_jobs_expire() -> TestResult {
        let checker = track!(RequirementsCheckerBuilder::new()
            .max_job_waiting_time(Duration::from_secs(3600))
            .finish())?;
        let mut state = StrategyState::new();
        state.add(job("1", 0));
        assert_eq!(state.move_expired_jobs(&checker, at(10_000)), 0);

        state.prepare_file_lookup();
        state.add(job("2", 0));
        assert_eq!(state.move_expired_jobs(&checker, at(3_600)), 0);
        assert_eq!(state.move_expired_jobs(&checker, at(3_601)), 1);
        assert_eq!(state.new_jobs.len(), 1);
        assert_eq!(state.immediate.len(), 1);
        Ok(())
    }
}
