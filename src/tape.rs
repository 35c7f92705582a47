//! テープ単位のスケジューリング情報.
use std::time::SystemTime;

/// ファイルのテープ上の位置情報.
///
/// 外部のメタデータ提供元から返される、ある時点でのスナップショット.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileInfo {
    /// ファイルのサイズ(バイト単位).
    pub file_size: u64,

    /// ファイルを格納しているテープの名前.
    pub tape_name: String,
}
impl FileInfo {
    /// 新しい`FileInfo`インスタンスを生成する.
    pub fn new<T: Into<String>>(file_size: u64, tape_name: T) -> Self {
        FileInfo {
            file_size,
            tape_name: tape_name.into(),
        }
    }
}

/// テープの容量情報.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TapeInfo {
    /// テープの容量(バイト単位).
    pub capacity: u64,

    /// テープの使用量(バイト単位).
    pub used_space: u64,
}
impl TapeInfo {
    /// 新しい`TapeInfo`インスタンスを生成する.
    pub fn new(capacity: u64, used_space: u64) -> Self {
        TapeInfo {
            capacity,
            used_space,
        }
    }
}

/// 一つのテープに関する、キャッシュされたスケジューリング情報.
///
/// 到着時刻は、まだアクティブ化されていない(i.e., キューイング中の)ジョブ群のみを対象として、
/// 逐次的に更新される.
/// キューが空の場合には、最古・最新の到着時刻は共に`None`となる.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TapeState {
    info: Option<TapeInfo>,
    oldest_job_arrival: Option<SystemTime>,
    newest_job_arrival: Option<SystemTime>,
}
impl TapeState {
    /// 容量情報も到着時刻も持たない`TapeState`インスタンスを生成する.
    pub fn new() -> Self {
        Self::default()
    }

    /// 容量情報を取得済みかどうか.
    pub fn has_tape_info(&self) -> bool {
        self.info.is_some()
    }

    /// テープの容量を返す.
    pub fn capacity(&self) -> Option<u64> {
        self.info.map(|i| i.capacity)
    }

    /// テープの使用量を返す.
    pub fn used_space(&self) -> Option<u64> {
        self.info.map(|i| i.used_space)
    }

    /// キューイング中のジョブの中で、最も古いものの到着時刻を返す.
    pub fn oldest_job_arrival(&self) -> Option<SystemTime> {
        self.oldest_job_arrival
    }

    /// キューイング中のジョブの中で、最も新しいものの到着時刻を返す.
    pub fn newest_job_arrival(&self) -> Option<SystemTime> {
        self.newest_job_arrival
    }

    /// 容量情報を更新する.
    pub(crate) fn set_tape_info(&mut self, info: TapeInfo) {
        self.info = Some(info);
    }

    /// 新しいジョブの到着を記録する.
    ///
    /// 到着順とジョブの生成時刻順は一致しないことがあるので、最古・最新の両方を比較して更新する.
    pub(crate) fn record_job_arrival(&mut self, time: SystemTime) {
        self.oldest_job_arrival = Some(self.oldest_job_arrival.map_or(time, |t| t.min(time)));
        self.newest_job_arrival = Some(self.newest_job_arrival.map_or(time, |t| t.max(time)));
    }

    /// 到着時刻を、生成時刻順に並んだジョブ群の先頭と末尾から設定し直す.
    pub(crate) fn reset_job_arrivals(&mut self, oldest: Option<SystemTime>, newest: Option<SystemTime>) {
        self.oldest_job_arrival = oldest;
        self.newest_job_arrival = newest;
    }

    pub(crate) fn clear_job_arrivals(&mut self) {
        self.reset_job_arrivals(None, None);
    }
}
