//! [Prometheus][prometheus]用のメトリクス.
//!
//! [prometheus]: https://prometheus.io/
use prometrics::metrics::{Counter, Gauge, MetricBuilder};

use crate::strategy::ActivationReason;

/// スケジューリング戦略のメトリクス.
#[derive(Debug, Clone)]
pub struct StrategyMetrics {
    pub(crate) added_jobs: Counter,
    pub(crate) dispatched_jobs: Counter,
    pub(crate) expired_jobs: Counter,
    pub(crate) metadata_refreshes: Counter,
    pub(crate) metadata_failures: Counter,
    pub(crate) active_tapes: Gauge,
    tape_activations: TapeActivationCounter,
}
impl StrategyMetrics {
    /// 追加されたジョブの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_strategy_added_jobs_total <COUNTER>
    /// ```
    pub fn added_jobs(&self) -> u64 {
        self.added_jobs.value() as u64
    }

    /// 払い出されたジョブの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_strategy_dispatched_jobs_total <COUNTER>
    /// ```
    pub fn dispatched_jobs(&self) -> u64 {
        self.dispatched_jobs.value() as u64
    }

    /// テープ情報を持たないまま最大待機時間を超え、即時キューに移されたジョブの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_strategy_expired_jobs_total <COUNTER>
    /// ```
    pub fn expired_jobs(&self) -> u64 {
        self.expired_jobs.value() as u64
    }

    /// メタデータのリフレッシュ回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_strategy_metadata_refreshes_total <COUNTER>
    /// ```
    pub fn metadata_refreshes(&self) -> u64 {
        self.metadata_refreshes.value() as u64
    }

    /// 失敗を含んだメタデータのリフレッシュ回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_strategy_metadata_failures_total <COUNTER>
    /// ```
    pub fn metadata_failures(&self) -> u64 {
        self.metadata_failures.value() as u64
    }

    /// 現在アクティブなテープの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_strategy_active_tapes <GAUGE>
    /// ```
    pub fn active_tapes(&self) -> usize {
        self.active_tapes.value() as usize
    }

    /// 選択理由毎のテープのアクティブ化回数.
    pub fn tape_activations(&self) -> &TapeActivationCounter {
        &self.tape_activations
    }

    pub(crate) fn new(builder: &MetricBuilder) -> Self {
        let mut builder = builder.clone();
        builder.namespace("tapesched").subsystem("strategy");
        StrategyMetrics {
            added_jobs: builder
                .counter("added_jobs_total")
                .help("Number of jobs added to the strategy")
                .finish()
                .expect("Never fails"),
            dispatched_jobs: builder
                .counter("dispatched_jobs_total")
                .help("Number of jobs handed out by the strategy")
                .finish()
                .expect("Never fails"),
            expired_jobs: builder
                .counter("expired_jobs_total")
                .help("Number of jobs without tape info moved to the immediate queue")
                .finish()
                .expect("Never fails"),
            metadata_refreshes: builder
                .counter("metadata_refreshes_total")
                .help("Number of tape metadata refreshes")
                .finish()
                .expect("Never fails"),
            metadata_failures: builder
                .counter("metadata_failures_total")
                .help("Number of tape metadata refreshes with failed lookups")
                .finish()
                .expect("Never fails"),
            active_tapes: builder
                .gauge("active_tapes")
                .help("Number of currently active tapes")
                .finish()
                .expect("Never fails"),
            tape_activations: TapeActivationCounter::new(&builder),
        }
    }
}

/// テープの選択理由毎のカウンタ.
#[derive(Debug, Clone)]
pub struct TapeActivationCounter {
    pub(crate) expired: Counter,
    pub(crate) recall_volume: Counter,
    pub(crate) queue_length: Counter,
}
impl TapeActivationCounter {
    /// 期限切れのジョブを理由としたアクティブ化の回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_strategy_tape_activations_total { rule="expired" } <COUNTER>
    /// ```
    pub fn expired(&self) -> u64 {
        self.expired.value() as u64
    }

    /// リコール量を理由としたアクティブ化の回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_strategy_tape_activations_total { rule="volume" } <COUNTER>
    /// ```
    pub fn recall_volume(&self) -> u64 {
        self.recall_volume.value() as u64
    }

    /// キューの長さを理由としたアクティブ化の回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_strategy_tape_activations_total { rule="queue_length" } <COUNTER>
    /// ```
    pub fn queue_length(&self) -> u64 {
        self.queue_length.value() as u64
    }

    fn new(builder: &MetricBuilder) -> Self {
        let counter = |rule| {
            builder
                .counter("tape_activations_total")
                .help("Number of tape activations")
                .label("rule", rule)
                .finish()
                .expect("Never fails")
        };
        TapeActivationCounter {
            expired: counter("expired"),
            recall_volume: counter("volume"),
            queue_length: counter("queue_length"),
        }
    }

    pub(crate) fn increment(&self, reason: ActivationReason) {
        match reason {
            ActivationReason::Expired => self.expired.increment(),
            ActivationReason::RecallVolume => self.recall_volume.increment(),
            ActivationReason::QueueLength => self.queue_length.increment(),
        }
    }
}

/// スケジューラのメトリクス.
#[derive(Debug, Clone)]
pub struct SchedulerMetrics {
    pub(crate) status: Gauge,
    pub(crate) admitted_requests: Counter,
    pub(crate) duplicate_requests: Counter,
    pub(crate) completed_replies: Counter,
    pub(crate) orphaned_jobs: Counter,
    pub(crate) ticks: Counter,
}
impl SchedulerMetrics {
    /// スケジューラが稼働中かどうか.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_scheduler_status <GAUGE>
    /// ```
    pub fn is_running(&self) -> bool {
        self.status.value() > 0.0
    }

    /// 受け付けたリクエストの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_scheduler_admitted_requests_total <COUNTER>
    /// ```
    pub fn admitted_requests(&self) -> u64 {
        self.admitted_requests.value() as u64
    }

    /// 重複のため拒否したリクエストの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_scheduler_duplicate_requests_total <COUNTER>
    /// ```
    pub fn duplicate_requests(&self) -> u64 {
        self.duplicate_requests.value() as u64
    }

    /// 完了させた応答の数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_scheduler_completed_replies_total <COUNTER>
    /// ```
    pub fn completed_replies(&self) -> u64 {
        self.completed_replies.value() as u64
    }

    /// 払い出されたが、対応する応答ハンドルが存在しなかったジョブの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_scheduler_orphaned_jobs_total <COUNTER>
    /// ```
    pub fn orphaned_jobs(&self) -> u64 {
        self.orphaned_jobs.value() as u64
    }

    /// 払い出し処理の実行回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_scheduler_ticks_total <COUNTER>
    /// ```
    pub fn ticks(&self) -> u64 {
        self.ticks.value() as u64
    }

    /// 応答待ちのリクエストの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tapesched_scheduler_admitted_requests_total - tapesched_scheduler_completed_replies_total
    /// ```
    pub fn pending_replies(&self) -> usize {
        // NOTE: 以下の順番で値を取得しないとアンダーフローする可能性がある
        let dec = self.completed_replies();
        let inc = self.admitted_requests();
        (inc - dec) as usize
    }

    pub(crate) fn new(builder: &MetricBuilder) -> Self {
        let mut builder = builder.clone();
        builder.namespace("tapesched").subsystem("scheduler");
        SchedulerMetrics {
            status: builder
                .gauge("status")
                .help("Status of the scheduler (0=stopped, 1=running)")
                .finish()
                .expect("Never fails"),
            admitted_requests: builder
                .counter("admitted_requests_total")
                .help("Number of admitted scheduling requests")
                .finish()
                .expect("Never fails"),
            duplicate_requests: builder
                .counter("duplicate_requests_total")
                .help("Number of requests rejected as already scheduled")
                .finish()
                .expect("Never fails"),
            completed_replies: builder
                .counter("completed_replies_total")
                .help("Number of completed replies")
                .finish()
                .expect("Never fails"),
            orphaned_jobs: builder
                .counter("orphaned_jobs_total")
                .help("Number of dispatched jobs without a registered reply")
                .finish()
                .expect("Never fails"),
            ticks: builder
                .counter("ticks_total")
                .help("Number of dispatch rounds")
                .finish()
                .expect("Never fails"),
        }
    }
}
