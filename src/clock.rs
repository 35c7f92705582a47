//! スケジューラが参照する時刻の供給源.
//!
//! ジョブの到着時刻や待機時間の判定は、全てこのモジュールの[Clock]経由で取得した時刻を用いて行われる.
//!
//! 通常は[SystemClock]を使えば良いが、テスト等で時刻を明示的に制御したい場合には[ManualClock]が利用可能.
//!
//! [Clock]: trait.Clock.html
//! [SystemClock]: struct.SystemClock.html
//! [ManualClock]: struct.ManualClock.html
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// 現在時刻を返すためのトレイト.
pub trait Clock: fmt::Debug + Send + Sync {
    /// 現在時刻を返す.
    fn now(&self) -> SystemTime;
}

/// システムの壁時計を使用する`Clock`実装.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;
impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// 手動で進める`Clock`実装.
///
/// クローンしたインスタンス同士は同じ時刻を共有する.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<Mutex<SystemTime>>);
impl ManualClock {
    /// 指定時刻を起点とする`ManualClock`インスタンスを生成する.
    pub fn new(start: SystemTime) -> Self {
        ManualClock(Arc::new(Mutex::new(start)))
    }

    /// 時刻を`duration`だけ進める.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.0.lock().unwrap_or_else(|e| e.into_inner());
        *now += duration;
    }

    /// 時刻を`time`に設定する.
    pub fn set(&self, time: SystemTime) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = time;
    }
}
impl Default for ManualClock {
    fn default() -> Self {
        ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000))
    }
}
impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}
