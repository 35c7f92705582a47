use fibers::sync::oneshot;
use futures::{Future, Poll};
use slog::Logger;
use std::sync::mpsc::{self as std_mpsc, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use trackable::error::ErrorKindExt;

use super::dispatcher::Dispatcher;
use crate::{Error, ErrorKind, Result};

pub type CommandSender = Sender<Command>;
type CommandReceiver = Receiver<Command>;

/// タイマースレッドに発行されるコマンド.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// 次の周期を待たずに払い出し処理を実行する.
    Tick,

    /// スレッドを停止する.
    Stop,
}

/// 一定間隔で払い出し処理を実行するスレッド.
#[derive(Debug)]
pub struct SchedulerThread {
    dispatcher: Arc<Dispatcher>,
    tick_interval: Duration,
    next_tick: Instant,
    command_rx: CommandReceiver,
    logger: Logger,
}
impl SchedulerThread {
    pub fn spawn(
        dispatcher: Arc<Dispatcher>,
        tick_interval: Duration,
        logger: Logger,
    ) -> (CommandSender, SchedulerThreadMonitor) {
        let (command_tx, command_rx) = std_mpsc::channel();
        let (monitored, monitor) = oneshot::monitor();
        dispatcher.metrics().status.set(1.0);

        thread::spawn(move || {
            info!(logger, "Scheduler started"; "tick_interval_ms" => tick_interval.as_millis() as u64);
            let mut this = SchedulerThread {
                dispatcher,
                tick_interval,
                next_tick: after(Instant::now(), tick_interval),
                command_rx,
                logger,
            };
            let result = loop {
                match track!(this.run_once()) {
                    Err(e) => break Err(e),
                    Ok(false) => break Ok(()),
                    Ok(true) => {}
                }
            };
            this.dispatcher.metrics().status.set(0.0);
            match result {
                Ok(()) => info!(this.logger, "Scheduler stopped"),
                Err(ref e) => error!(this.logger, "Scheduler aborted: {}", e),
            }
            monitored.exit(result);
        });

        (command_tx, SchedulerThreadMonitor(monitor))
    }

    fn run_once(&mut self) -> Result<bool> {
        let timeout = self.next_tick.saturating_duration_since(Instant::now());
        match self.command_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) | Ok(Command::Stop) => Ok(false),
            Err(RecvTimeoutError::Timeout) => {
                self.next_tick = after(self.next_tick, self.tick_interval);
                track!(self.dispatch())?;
                Ok(true)
            }
            Ok(Command::Tick) => {
                track!(self.dispatch())?;
                Ok(true)
            }
        }
    }

    fn dispatch(&mut self) -> Result<()> {
        let completed = track!(self.dispatcher.tick())?;
        if completed > 0 {
            debug!(self.logger, "Completed {} replies", completed);
        }

        // 処理が周期よりも長引いた場合には、溜まった分をまとめて実行せずに次の周期に合わせる
        let now = Instant::now();
        if self.next_tick < now {
            self.next_tick = after(now, self.tick_interval);
        }
        Ok(())
    }
}

/// `Instant`の表現範囲を超える場合には`base`をそのまま返す.
fn after(base: Instant, interval: Duration) -> Instant {
    base.checked_add(interval).unwrap_or(base)
}

/// タイマースレッドの死活監視用オブジェクト.
#[derive(Debug)]
pub struct SchedulerThreadMonitor(oneshot::Monitor<(), Error>);
impl Future for SchedulerThreadMonitor {
    type Item = ();
    type Error = Error;
    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        track!(self
            .0
            .poll()
            .map_err(|e| e.unwrap_or_else(|| ErrorKind::SchedulerTerminated
                .cause("`SchedulerThread` terminated unintentionally")
                .into())))
    }
}
