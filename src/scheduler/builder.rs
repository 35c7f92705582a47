use prometrics::metrics::MetricBuilder;
use slog::{Discard, Logger};
use std::sync::Arc;
use std::time::Duration;

use super::dispatcher::Dispatcher;
use super::thread::SchedulerThread;
use super::{Scheduler, SchedulerHandle};
use crate::metrics::SchedulerMetrics;
use crate::strategy::SchedulingStrategy;
use crate::{ErrorKind, Result};

/// `Scheduler`のビルダ.
#[derive(Debug, Clone)]
pub struct SchedulerBuilder {
    pub(crate) tick_interval: Duration,
    pub(crate) max_retrievals_per_tick: usize,
    pub(crate) logger: Logger,
    pub(crate) metrics: MetricBuilder,
}
impl SchedulerBuilder {
    /// 払い出し処理の実行間隔のデフォルト値.
    pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;

    /// 払い出し処理の実行間隔の上限値.
    pub const MAX_TICK_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

    /// 一回の払い出し処理で取り出すジョブの最大数のデフォルト値.
    pub const DEFAULT_MAX_RETRIEVALS_PER_TICK: usize = 10;

    /// デフォルト設定で`SchedulerBuilder`インスタンスを生成する.
    pub fn new() -> Self {
        SchedulerBuilder {
            tick_interval: Duration::from_secs(Self::DEFAULT_TICK_INTERVAL_SECS),
            max_retrievals_per_tick: Self::DEFAULT_MAX_RETRIEVALS_PER_TICK,
            logger: Logger::root(Discard, o!()),
            metrics: MetricBuilder::new(),
        }
    }

    /// メトリクス用の共通設定を登録する.
    ///
    /// デフォルト値は`MetricBuilder::new()`.
    pub fn metrics(&mut self, metrics: MetricBuilder) -> &mut Self {
        self.metrics = metrics;
        self
    }

    /// 払い出し処理の実行間隔を設定する.
    ///
    /// 戦略側のメタデータのリフレッシュ間隔よりも短くしておくことが想定されている.
    ///
    /// 上限は`MAX_TICK_INTERVAL_SECS`秒.
    ///
    /// デフォルト値は`Duration::from_secs(30)`.
    pub fn tick_interval(&mut self, interval: Duration) -> &mut Self {
        self.tick_interval = interval;
        self
    }

    /// 一回の払い出し処理で、戦略から取り出すジョブの最大数を設定する.
    ///
    /// デフォルト値は`10`.
    pub fn max_retrievals_per_tick(&mut self, n: usize) -> &mut Self {
        self.max_retrievals_per_tick = n;
        self
    }

    /// ロガーを設定する.
    pub fn logger(&mut self, logger: Logger) -> &mut Self {
        self.logger = logger;
        self
    }

    /// 指定の戦略を用いるスケジューラを起動する.
    ///
    /// # Errors
    ///
    /// 実行間隔が`0`ないし上限を超えている場合や、最大取り出し数が`0`の場合には、
    /// 種類が`ErrorKind::InvalidInput`のエラーが返される.
    pub fn spawn(&self, strategy: SchedulingStrategy) -> Result<Scheduler> {
        track_assert!(
            self.tick_interval > Duration::from_secs(0),
            ErrorKind::InvalidInput
        );
        track_assert!(
            self.tick_interval <= Duration::from_secs(Self::MAX_TICK_INTERVAL_SECS),
            ErrorKind::InvalidInput,
            "too long tick interval: {:?}",
            self.tick_interval
        );
        track_assert!(self.max_retrievals_per_tick > 0, ErrorKind::InvalidInput);

        let metrics = SchedulerMetrics::new(&self.metrics);
        let dispatcher = Arc::new(Dispatcher::new(
            strategy,
            self.max_retrievals_per_tick,
            self.logger.clone(),
            metrics,
        ));
        let (command_tx, monitor) = SchedulerThread::spawn(
            Arc::clone(&dispatcher),
            self.tick_interval,
            self.logger.clone(),
        );
        let handle = SchedulerHandle::new(dispatcher, command_tx);
        Ok(Scheduler::new(monitor, handle))
    }
}
impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
