//! 外部からのステージング要求を受け付けて、戦略が決めた順番で応答を返すスケジューラ.
//!
//! 要求は[SchedulerHandle::admit]で受け付けられ、その応答は[AsyncResult]として返される.
//!
//! スケジューラは一つのタイマースレッドを持ち、一定間隔で戦略から払い出し可能なジョブを取り出して、
//! 対応する応答を完了させる.
//! 応答が完了した時点で、要求元はそのファイルのステージングを開始して良い.
//!
//! [SchedulerHandle::admit]: struct.SchedulerHandle.html#method.admit
//! [AsyncResult]: struct.AsyncResult.html
use futures::{Async, Future, Poll};
use std::sync::Arc;
use std::time::SystemTime;

pub use self::builder::SchedulerBuilder;
pub use self::reply::{AsyncResult, PendingReply, ScheduleOutcome, ScheduleRequest};

use self::dispatcher::Dispatcher;
use self::thread::{Command, CommandSender, SchedulerThreadMonitor};
use crate::metrics::SchedulerMetrics;
use crate::strategy::SchedulingStrategy;
use crate::{Error, Result};

mod builder;
mod dispatcher;
mod reply;
mod thread;

/// テープからのステージング要求のスケジューラ.
///
/// [モジュールドキュメント](index.html)も参照のこと.
///
/// # Future実装
///
/// `Scheduler`は[Future]を実装しており、タイマースレッドの終了(正常ないし異常)を検知することが可能.
///
/// `Scheduler`インスタンスが破棄されると、タイマースレッドも停止させられるので、
/// `Future::poll`を呼び出さない場合でも、インスタンス自体は保持しておく必要がある.
///
/// [Future]: https://docs.rs/futures/0.1/futures/future/trait.Future.html
#[must_use]
#[derive(Debug)]
pub struct Scheduler {
    monitor: SchedulerThreadMonitor,
    handle: SchedulerHandle,
    is_stopped: bool,
}
impl Scheduler {
    /// デフォルト設定でスケジューラを起動する.
    ///
    /// 設定を変更したい場合には`SchedulerBuilder`を使用すること.
    pub fn spawn(strategy: SchedulingStrategy) -> Result<Scheduler> {
        track!(SchedulerBuilder::new().spawn(strategy))
    }

    /// スケジューラを操作するためのハンドルを返す.
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// タイマースレッドに停止リクエストを発行する.
    ///
    /// 完了待ちの応答ハンドル群は、全てのハンドルが破棄されるまで保持され、
    /// その後に`ErrorKind::SchedulerTerminated`で終わる.
    pub fn stop(&self) {
        self.handle.send_command(Command::Stop);
    }

    fn new(monitor: SchedulerThreadMonitor, handle: SchedulerHandle) -> Self {
        Scheduler {
            monitor,
            handle,
            is_stopped: false,
        }
    }
}
impl Future for Scheduler {
    type Item = ();
    type Error = Error;
    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        let result = track!(self.monitor.poll());
        if let Ok(Async::NotReady) = result {
        } else {
            self.is_stopped = true;
        }
        result
    }
}
impl Drop for Scheduler {
    fn drop(&mut self) {
        if !self.is_stopped {
            self.stop();
        }
    }
}

/// スケジューラを操作するためのハンドル.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    dispatcher: Arc<Dispatcher>,
    command_tx: CommandSender,
}
impl SchedulerHandle {
    /// 要求を受け付ける.
    ///
    /// ジョブの生成時刻には、戦略の時計の現在時刻が使われる.
    ///
    /// 返り値の`AsyncResult`は、ジョブが払い出された時点で完了する.
    /// 同じリクエストIDとファイルIDの組が既に受け付け済みの場合には、
    /// `ErrorKind::InvalidInput`で即座に完了する(受け付け済みの要求には影響しない).
    pub fn admit(&self, request: ScheduleRequest) -> AsyncResult<ScheduleOutcome> {
        let now = self.dispatcher.strategy().now();
        self.dispatcher.admit(request, now)
    }

    /// 生成時刻を明示して要求を受け付ける.
    ///
    /// 要求元で既に待たされていた時間を、待機時間の判定に含めたい場合に使う.
    pub fn admit_at(
        &self,
        request: ScheduleRequest,
        creation_time: SystemTime,
    ) -> AsyncResult<ScheduleOutcome> {
        self.dispatcher.admit(request, creation_time)
    }

    /// 払い出し処理を一回、呼び出し元のスレッドで実行する.
    ///
    /// 完了させた応答の数を返す.
    pub fn tick(&self) -> Result<usize> {
        track!(self.dispatcher.tick())
    }

    /// 次の周期を待たずに、タイマースレッドに払い出し処理を実行させる.
    pub fn wake(&self) {
        self.send_command(Command::Tick);
    }

    /// キューの状態やメタデータの取得元の説明を含む、人間向けの状態表示を返す.
    pub fn info(&self) -> String {
        self.dispatcher.info()
    }

    /// 使用中の戦略を返す.
    pub fn strategy(&self) -> &SchedulingStrategy {
        self.dispatcher.strategy()
    }

    /// スケジューラのメトリクスを返す.
    pub fn metrics(&self) -> &SchedulerMetrics {
        self.dispatcher.metrics()
    }

    fn new(dispatcher: Arc<Dispatcher>, command_tx: CommandSender) -> Self {
        SchedulerHandle {
            dispatcher,
            command_tx,
        }
    }

    fn send_command(&self, command: Command) {
        // スレッドが既に終了している場合には何もしない
        let _ = self.command_tx.send(command);
    }
}

#[cfg(test)]
mod tests {
    use fibers_global::execute;
    use std::thread;
    use std::time::Duration;
    use trackable::result::TestResult;

    use super::*;
    use crate::clock::ManualClock;
    use crate::informant::{MemoryTapeInfoProvider, TapeInformant};
    use crate::job::{FileId, Job, JobId};
    use crate::requirements::RequirementsCheckerBuilder;
    use crate::strategy::SchedulingStrategyBuilder;
    use crate::tape::{FileInfo, TapeInfo};
    use crate::ErrorKind;

    fn strategy(files: &[&str]) -> Result<SchedulingStrategy> {
        let provider = MemoryTapeInfoProvider::new();
        provider.add_tape_info("tape1", TapeInfo::new(100, 10));
        for file in files {
            provider.add_file_info(FileId::new(*file), FileInfo::new(1, "tape1"));
        }
        let checker = track!(RequirementsCheckerBuilder::new()
            .min_job_waiting_time(Duration::from_secs(0))
            .min_requests_for_tape_selection(Some(1))
            .finish())?;
        Ok(SchedulingStrategyBuilder::new()
            .refresh_interval(Duration::from_secs(0))
            .clock(ManualClock::default())
            .finish(checker, TapeInformant::new(provider)))
    }

    fn idle_scheduler(strategy: SchedulingStrategy) -> Result<Scheduler> {
        track!(SchedulerBuilder::new()
            .tick_interval(Duration::from_secs(3600))
            .spawn(strategy))
    }

    #[test]
    fn admitted_request_is_scheduled() -> TestResult {
        let scheduler = track!(idle_scheduler(track!(strategy(&["0001"]))?))?;
        let handle = scheduler.handle();
        let request =
            ScheduleRequest::new("r1", FileId::new("0001")).lifetime(Duration::from_secs(60));
        let result = handle.admit(request.clone());
        assert_eq!(handle.metrics().pending_replies(), 1);

        assert_eq!(track!(handle.tick())?, 1);
        assert_eq!(
            track!(execute(result))?,
            ScheduleOutcome::Scheduled(request)
        );
        assert_eq!(handle.metrics().pending_replies(), 0);
        assert_eq!(handle.strategy().size(), 0);
        Ok(())
    }

    #[test]
    fn duplicate_request_is_rejected() -> TestResult {
        let scheduler = track!(idle_scheduler(track!(strategy(&["0001"]))?))?;
        let handle = scheduler.handle();
        let request = ScheduleRequest::new("r1", FileId::new("0001"));
        let first = handle.admit(request.clone());
        let second = handle.admit(request);

        assert_eq!(
            execute(second).err().map(|e| *e.kind()),
            Some(ErrorKind::InvalidInput)
        );
        assert_eq!(handle.metrics().duplicate_requests(), 1);
        assert_eq!(handle.strategy().size(), 1);

        assert_eq!(track!(handle.tick())?, 1);
        assert!(track!(execute(first))?.is_scheduled());
        Ok(())
    }

    #[test]
    fn retrievals_per_tick_are_bounded() -> TestResult {
        let files = (0..15).map(|i| format!("{:04}", i)).collect::<Vec<_>>();
        let names = files.iter().map(String::as_str).collect::<Vec<_>>();
        let scheduler = track!(idle_scheduler(track!(strategy(&names))?))?;
        let handle = scheduler.handle();
        let results = files
            .iter()
            .map(|f| handle.admit(ScheduleRequest::new("r", FileId::new(f.as_str()))))
            .collect::<Vec<_>>();

        assert_eq!(track!(handle.tick())?, 10);
        assert_eq!(track!(handle.tick())?, 5);
        assert_eq!(track!(handle.tick())?, 0);
        for result in results {
            assert!(track!(execute(result))?.is_scheduled());
        }
        assert_eq!(handle.metrics().ticks(), 3);
        Ok(())
    }

    #[test]
    fn job_without_reply_is_counted_as_orphan() -> TestResult {
        let scheduler = track!(idle_scheduler(track!(strategy(&["0001"]))?))?;
        let handle = scheduler.handle();
        let now = handle.strategy().now();
        handle
            .strategy()
            .add(Job::new(JobId::new("r1", FileId::new("0001")), now));

        assert_eq!(track!(handle.tick())?, 0);
        assert_eq!(handle.metrics().orphaned_jobs(), 1);
        Ok(())
    }

    #[test]
    fn timer_thread_dispatches_jobs() -> TestResult {
        let scheduler = track!(SchedulerBuilder::new()
            .tick_interval(Duration::from_millis(10))
            .spawn(track!(strategy(&["0001"]))?))?;
        let handle = scheduler.handle();
        assert!(handle.metrics().is_running());

        let result = handle.admit(ScheduleRequest::new("r1", FileId::new("0001")));
        handle.wake();
        assert!(track!(execute(result))?.is_scheduled());
        Ok(())
    }

    #[test]
    fn stopped_scheduler_terminates_pending_replies() -> TestResult {
        let scheduler = track!(idle_scheduler(track!(strategy(&[]))?))?;
        let handle = scheduler.handle();
        let result = handle.admit(ScheduleRequest::new("r1", FileId::new("unknown")));
        assert!(handle.info().contains("pending replies: 1"));

        scheduler.stop();
        track!(execute(scheduler))?;
        assert!(!handle.metrics().is_running());

        drop(handle);
        assert_eq!(
            execute(result).err().map(|e| *e.kind()),
            Some(ErrorKind::SchedulerTerminated)
        );
        Ok(())
    }

    #[test]
    fn concurrent_admissions_are_scheduled_exactly_once() -> TestResult {
        const THREADS: usize = 4;
        const REQUESTS: usize = 1000;

        let clock = ManualClock::default();
        let provider = MemoryTapeInfoProvider::new();
        for t in 0..8 {
            provider.add_tape_info(format!("tape{}", t), TapeInfo::new(1000, 500));
        }
        for i in 0..THREADS * REQUESTS {
            // 三つに一つはテープが判明しない
            if i % 3 != 0 {
                let file = FileId::new(format!("{:08}", i));
                provider.add_file_info(file, FileInfo::new(1, format!("tape{}", i % 8)));
            }
        }
        let checker = track!(RequirementsCheckerBuilder::new()
            .max_active_tapes(2)
            .min_job_waiting_time(Duration::from_secs(1))
            .max_job_waiting_time(Duration::from_secs(60))
            .min_requests_for_tape_selection(Some(1))
            .finish())?;
        let strategy = SchedulingStrategyBuilder::new()
            .refresh_interval(Duration::from_secs(0))
            .clock(clock.clone())
            .finish(checker, TapeInformant::new(provider));
        let scheduler = track!(SchedulerBuilder::new()
            .tick_interval(Duration::from_millis(1))
            .max_retrievals_per_tick(50)
            .spawn(strategy))?;
        let handle = scheduler.handle();

        let admitters = (0..THREADS)
            .map(|t| {
                let handle = handle.clone();
                let clock = clock.clone();
                thread::spawn(move || {
                    (0..REQUESTS)
                        .map(|i| {
                            let n = t * REQUESTS + i;
                            if n % 100 == 0 {
                                clock.advance(Duration::from_secs(1));
                            }
                            let request = ScheduleRequest::new(
                                format!("r{}", n),
                                FileId::new(format!("{:08}", n)),
                            );
                            (request.clone(), handle.admit(request))
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();

        // タイマースレッドと並行して、このスレッドからも払い出しを行う
        while handle.metrics().admitted_requests() < (THREADS * REQUESTS) as u64 {
            track!(handle.tick())?;
        }
        let mut results = Vec::with_capacity(THREADS * REQUESTS);
        for admitter in admitters {
            results.extend(admitter.join().expect("admitter panicked"));
        }

        // 残りのジョブ群は最大待機時間の経過後に全て払い出される
        clock.advance(Duration::from_secs(120));
        for _ in 0..10_000 {
            if handle.metrics().pending_replies() == 0 {
                break;
            }
            track!(handle.tick())?;
        }

        for (request, result) in results {
            assert_eq!(
                track!(execute(result))?,
                ScheduleOutcome::Scheduled(request)
            );
        }
        let metrics = handle.metrics();
        assert_eq!(metrics.admitted_requests(), (THREADS * REQUESTS) as u64);
        assert_eq!(metrics.completed_replies(), (THREADS * REQUESTS) as u64);
        assert_eq!(metrics.duplicate_requests(), 0);
        assert_eq!(metrics.orphaned_jobs(), 0);
        assert_eq!(handle.strategy().size(), 0);
        assert_eq!(
            handle.strategy().metrics().added_jobs(),
            handle.strategy().metrics().dispatched_jobs()
        );
        Ok(())
    }

    #[test]
    fn invalid_settings_are_rejected() -> TestResult {
        assert!(SchedulerBuilder::new()
            .tick_interval(Duration::from_secs(0))
            .spawn(track!(strategy(&[]))?)
            .is_err());
        assert!(SchedulerBuilder::new()
            .max_retrievals_per_tick(0)
            .spawn(track!(strategy(&[]))?)
            .is_err());
        assert_eq!(
            SchedulerBuilder::new()
                .tick_interval(Duration::from_secs(u64::MAX))
                .spawn(track!(strategy(&[]))?)
                .err()
                .map(|e| *e.kind()),
            Some(ErrorKind::InvalidInput)
        );
        let max = Duration::from_secs(SchedulerBuilder::MAX_TICK_INTERVAL_SECS);
        let scheduler = track!(SchedulerBuilder::new()
            .tick_interval(max)
            .spawn(track!(strategy(&[]))?))?;
        assert!(scheduler.handle().metrics().is_running());
        Ok(())
    }
}
