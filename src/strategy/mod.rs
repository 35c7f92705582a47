//! テープ単位でジョブをまとめるスケジューリング戦略.
//!
//! [SchedulingStrategy]は、全ての未払い出しジョブを保持し、
//! どのテープをアクティブ化(i.e., マウント)するかを決定した上で、払い出すジョブの順番を決める.
//!
//! 各ジョブは、以下の状態を順番に遷移する:
//!
//! ```text
//! NEW (テープ未判明)
//!  => QUEUED (テープ判明済み、テープは非アクティブ)
//!  => ACTIVE (テープがアクティブで、順番待ち)
//!  => READY (払い出し待ち)
//! ```
//!
//! 最大待機時間を超えたジョブは、テープのアクティブ化規則を迂回して`READY`に移される.
//!
//! [SchedulingStrategy]: struct.SchedulingStrategy.html
use prometrics::metrics::MetricBuilder;
use slog::{Discard, Logger};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use self::state::StrategyState;
use crate::clock::{Clock, SystemClock};
use crate::informant::TapeInformant;
use crate::job::{Job, JobId};
use crate::metrics::StrategyMetrics;
use crate::requirements::RequirementsChecker;

mod selection;
mod state;

/// テープがアクティブ化された理由.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationReason {
    /// キューイング中のジョブが最大待機時間を超えていた.
    Expired,

    /// キューイング中のジョブ群の合計サイズが十分だった.
    RecallVolume,

    /// キューイング中のジョブの数が十分だった.
    QueueLength,
}
impl fmt::Display for ActivationReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ActivationReason::Expired => write!(f, "expired"),
            ActivationReason::RecallVolume => write!(f, "volume"),
            ActivationReason::QueueLength => write!(f, "queue_length"),
        }
    }
}

/// `SchedulingStrategy`のビルダ.
#[derive(Debug, Clone)]
pub struct SchedulingStrategyBuilder {
    refresh_interval: Duration,
    clock: Arc<dyn Clock>,
    logger: Logger,
    metrics: MetricBuilder,
}
impl SchedulingStrategyBuilder {
    /// メタデータのリフレッシュ間隔のデフォルト値.
    pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

    /// デフォルト設定で`SchedulingStrategyBuilder`を生成する.
    pub fn new() -> Self {
        SchedulingStrategyBuilder {
            refresh_interval: Duration::from_secs(Self::DEFAULT_REFRESH_INTERVAL_SECS),
            clock: Arc::new(SystemClock),
            logger: Logger::root(Discard, o!()),
            metrics: MetricBuilder::new(),
        }
    }

    /// メタデータのリフレッシュ間隔を設定する.
    ///
    /// `remove`の呼び出し時に、前回のリフレッシュからこの時間以上経過していれば、
    /// テープ未判明のジョブ群の位置情報と、容量未取得のテープ群の情報が取得される.
    ///
    /// `0`の場合には、`remove`の度にリフレッシュが行われる.
    ///
    /// デフォルト値は`Self::DEFAULT_REFRESH_INTERVAL_SECS`.
    pub fn refresh_interval(&mut self, interval: Duration) -> &mut Self {
        self.refresh_interval = interval;
        self
    }

    /// 時刻の供給源を設定する.
    ///
    /// デフォルト値は`SystemClock`.
    pub fn clock<C: Clock + 'static>(&mut self, clock: C) -> &mut Self {
        self.clock = Arc::new(clock);
        self
    }

    /// ロガーを設定する.
    pub fn logger(&mut self, logger: Logger) -> &mut Self {
        self.logger = logger;
        self
    }

    /// メトリクス用の共通設定を登録する.
    ///
    /// デフォルト値は`MetricBuilder::new()`.
    pub fn metrics(&mut self, metrics: MetricBuilder) -> &mut Self {
        self.metrics = metrics;
        self
    }

    /// 指定の条件と情報取得元を用いる`SchedulingStrategy`を生成する.
    pub fn finish(
        &self,
        checker: RequirementsChecker,
        informant: TapeInformant,
    ) -> SchedulingStrategy {
        SchedulingStrategy {
            state: Mutex::new(StrategyState::new()),
            checker,
            informant,
            refresh_interval: self.refresh_interval,
            clock: Arc::clone(&self.clock),
            logger: self.logger.clone(),
            metrics: StrategyMetrics::new(&self.metrics),
        }
    }
}
impl Default for SchedulingStrategyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// テープ単位でジョブをまとめるスケジューリング戦略.
///
/// 全ての操作は、単一のロックで保護された短いクリティカルセクション内で実行される.
/// ただし、メタデータの取得中はロックが解放されるので、その間も`add`や`size`は待たされない.
#[derive(Debug)]
pub struct SchedulingStrategy {
    state: Mutex<StrategyState>,
    checker: RequirementsChecker,
    informant: TapeInformant,
    refresh_interval: Duration,
    clock: Arc<dyn Clock>,
    logger: Logger,
    metrics: StrategyMetrics,
}
impl SchedulingStrategy {
    /// ジョブを追加する.
    ///
    /// ジョブはテープ未判明の状態として登録され、次のリフレッシュ時に位置情報が問い合わせられる.
    pub fn add(&self, job: Job) {
        debug!(self.logger, "Adds a job: {}", job.id());
        // 払い出し数が追加数を追い越さないように、登録前に数える
        self.metrics.added_jobs.increment();
        self.lock().add(job);
    }

    /// 払い出し可能なジョブを一つ取り出す.
    ///
    /// 払い出し可能なジョブが存在しない場合には`None`が返される.
    ///
    /// 必要に応じて、メタデータのリフレッシュとテープのアクティブ化も行われる.
    pub fn remove(&self) -> Option<JobId> {
        let now = self.clock.now();
        self.refresh_if_due(now);

        let mut state = self.lock();
        for (tape, jobs, reason) in state.refill_active_tape_slots(&self.checker, now) {
            info!(
                self.logger,
                "Activates tape {:?} ({} jobs)", tape, jobs;
                "rule" => reason.to_string()
            );
            self.metrics.tape_activations().increment(reason);
        }

        if state.is_immediate_queue_empty() {
            let expired = state.move_expired_jobs(&self.checker, now);
            if expired > 0 {
                info!(
                    self.logger,
                    "{} jobs without tape info exceeded the maximum waiting time", expired
                );
                self.metrics.expired_jobs.add_u64(expired as u64);
            }
            for tape in state.move_next_tape_jobs() {
                debug!(self.logger, "Deactivates tape {:?}", tape);
            }
        }
        self.metrics.active_tapes.set(state.active_tapes() as f64);

        let job = state.pop_immediate();
        debug!(self.logger, "Queue state: {}", state.snapshot(); "job" => job.as_ref().map(|j| j.to_string()));
        if job.is_some() {
            self.metrics.dispatched_jobs.increment();
        }
        job
    }

    /// 保持しているジョブの総数を返す.
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// 現在のキューの状態を返す.
    pub fn snapshot(&self) -> QueueSnapshot {
        self.lock().snapshot()
    }

    /// テープのアクティブ化条件を返す.
    pub fn requirements(&self) -> &RequirementsChecker {
        &self.checker
    }

    /// メタデータの取得元を返す.
    pub fn informant(&self) -> &TapeInformant {
        &self.informant
    }

    /// 戦略のメトリクスを返す.
    pub fn metrics(&self) -> &StrategyMetrics {
        &self.metrics
    }

    /// 戦略が参照している時計の現在時刻.
    pub(crate) fn now(&self) -> SystemTime {
        self.clock.now()
    }

    fn lock(&self) -> MutexGuard<StrategyState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn refresh_if_due(&self, now: SystemTime) {
        let file_ids = {
            let mut state = self.lock();
            if !state.claim_refresh(now, self.refresh_interval) {
                return;
            }
            state.prepare_file_lookup()
        };
        self.metrics.metadata_refreshes.increment();
        let mut failed = false;

        if !file_ids.is_empty() {
            let (infos, file_failed) = self.informant.file_infos(&file_ids);
            let resolved = self.lock().apply_file_infos(&infos);
            info!(
                self.logger,
                "Retrieved info on {}/{} files", infos.len(), file_ids.len();
                "resolved_jobs" => resolved
            );
            failed |= file_failed;
        }

        let tapes = self.lock().tapes_without_info();
        if !tapes.is_empty() {
            let (infos, tape_failed) = self.informant.tape_infos(&tapes);
            self.lock().apply_tape_infos(&infos);
            info!(self.logger, "Retrieved info on {}/{} tapes", infos.len(), tapes.len());
            failed |= tape_failed;
        }

        if failed {
            self.metrics.metadata_failures.increment();
        }
    }
}

/// キューの状態のスナップショット.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// テープ未判明のジョブの数.
    pub new_jobs: usize,

    /// 非アクティブなテープでキューイング中のジョブの数.
    pub queued_jobs: usize,

    /// アクティブなテープで順番待ちをしているジョブの数.
    pub active_jobs: usize,

    /// 払い出し待ちのジョブの数.
    pub immediate_jobs: usize,

    /// 非アクティブなテープ毎のジョブの数.
    pub pending_tapes: Vec<(String, usize)>,

    /// アクティブなテープ毎のジョブの数.
    pub active_tapes: Vec<(String, usize)>,
}
impl QueueSnapshot {
    /// ジョブの総数.
    pub fn total(&self) -> usize {
        self.new_jobs + self.queued_jobs + self.active_jobs + self.immediate_jobs
    }
}
impl fmt::Display for QueueSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "new jobs: {} | jobs by tape: {} | jobs from active tapes: {} | immediate jobs: {} | total: {}",
            self.new_jobs,
            self.queued_jobs,
            self.active_jobs,
            self.immediate_jobs,
            self.total()
        )?;
        for (label, tapes) in &[("pending", &self.pending_tapes), ("active", &self.active_tapes)] {
            if tapes.is_empty() {
                continue;
            }
            write!(f, "\n{} tapes:", label)?;
            for (tape, jobs) in tapes.iter() {
                write!(f, " ({}, {})", tape, jobs)?;
            }
        }
        Ok(())
    }
}
