//! テープのアクティブ化(マウント)やジョブの期限切れを判定するためのポリシー.
//!
//! [RequirementsChecker]は設定値のみを保持する不変オブジェクトで、
//! 全ての判定は、設定値と呼び出し側が渡した時刻・容量から決まる純粋関数となっている.
//!
//! [RequirementsChecker]: struct.RequirementsChecker.html
use std::cmp::Ordering;
use std::time::{Duration, SystemTime};

use crate::job::Job;
use crate::tape::TapeState;
use crate::{ErrorKind, Result};

/// `RequirementsChecker`のビルダ.
#[derive(Debug, Clone)]
pub struct RequirementsCheckerBuilder {
    max_active_tapes: usize,
    min_tape_recall_percentage: u8,
    min_requests_for_tape_selection: Option<usize>,
    min_job_waiting_time: Duration,
    max_job_waiting_time: Duration,
}
impl RequirementsCheckerBuilder {
    /// デフォルト設定で`RequirementsCheckerBuilder`インスタンスを生成する.
    pub fn new() -> Self {
        RequirementsCheckerBuilder {
            max_active_tapes: 1,
            min_tape_recall_percentage: 80,
            min_requests_for_tape_selection: None,
            min_job_waiting_time: Duration::from_secs(2 * 60),
            max_job_waiting_time: Duration::from_secs(60 * 60),
        }
    }

    /// 同時にアクティブ化(マウント)可能なテープの最大数を設定する.
    ///
    /// `1`以上である必要がある.
    ///
    /// デフォルト値は`1`.
    pub fn max_active_tapes(&mut self, n: usize) -> &mut Self {
        self.max_active_tapes = n;
        self
    }

    /// テープをマウントする価値があると判断するための、リコール量の下限を設定する.
    ///
    /// キューイング中のジョブ群のファイルサイズの合計が、テープ容量のこの割合(百分率)以上であれば、
    /// そのテープは「リコール量が十分」とみなされる.
    ///
    /// 取り得る値は`0`から`100`まで.
    ///
    /// デフォルト値は`80`.
    pub fn min_tape_recall_percentage(&mut self, percentage: u8) -> &mut Self {
        self.min_tape_recall_percentage = percentage;
        self
    }

    /// キューの長さに基づくテープ選択を有効にし、その閾値を設定する.
    ///
    /// リコール量に基づく選択でテープが決まらなかった場合に、
    /// キューが最も長いテープのジョブ数がこの値以上であれば、そのテープが選択される.
    ///
    /// `None`を指定した場合には、キューの長さに基づく選択は行われない.
    ///
    /// デフォルト値は`None`.
    pub fn min_requests_for_tape_selection(&mut self, n: Option<usize>) -> &mut Self {
        self.min_requests_for_tape_selection = n;
        self
    }

    /// テープに最後にジョブが到着してから、そのテープがアクティブ化の候補となるまでの最小待機時間.
    ///
    /// 同じテープを対象とするジョブが続けて到着する余地を残し、一回のマウントでより多くのジョブを処理するためのもの.
    ///
    /// デフォルト値は`Duration::from_secs(120)`.
    pub fn min_job_waiting_time(&mut self, duration: Duration) -> &mut Self {
        self.min_job_waiting_time = duration;
        self
    }

    /// ジョブの最大待機時間.
    ///
    /// これを超えて待機したジョブは、通常の選択ポリシーを無視して優先的に処理される.
    ///
    /// デフォルト値は`Duration::from_secs(3600)`.
    pub fn max_job_waiting_time(&mut self, duration: Duration) -> &mut Self {
        self.max_job_waiting_time = duration;
        self
    }

    /// 設定値を検証した上で`RequirementsChecker`を生成する.
    ///
    /// # Errors
    ///
    /// 設定値が不正な場合には、種類が`ErrorKind::InvalidInput`のエラーが返される.
    pub fn finish(&self) -> Result<RequirementsChecker> {
        track_assert!(self.max_active_tapes > 0, ErrorKind::InvalidInput);
        track_assert!(self.min_tape_recall_percentage <= 100, ErrorKind::InvalidInput;
                      self.min_tape_recall_percentage);
        if let Some(n) = self.min_requests_for_tape_selection {
            track_assert!(n > 0, ErrorKind::InvalidInput);
        }
        track_assert!(self.min_job_waiting_time <= self.max_job_waiting_time, ErrorKind::InvalidInput;
                      self.min_job_waiting_time, self.max_job_waiting_time);
        Ok(RequirementsChecker {
            max_active_tapes: self.max_active_tapes,
            min_tape_recall_percentage: self.min_tape_recall_percentage,
            min_requests_for_tape_selection: self.min_requests_for_tape_selection,
            min_job_waiting_time: self.min_job_waiting_time,
            max_job_waiting_time: self.max_job_waiting_time,
        })
    }
}
impl Default for RequirementsCheckerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// テープ選択やジョブの期限切れに関するポリシー.
#[derive(Debug, Clone)]
pub struct RequirementsChecker {
    max_active_tapes: usize,
    min_tape_recall_percentage: u8,
    min_requests_for_tape_selection: Option<usize>,
    min_job_waiting_time: Duration,
    max_job_waiting_time: Duration,
}
impl RequirementsChecker {
    /// 同時にアクティブ化可能なテープの最大数.
    pub fn max_active_tapes(&self) -> usize {
        self.max_active_tapes
    }

    /// リコール量の下限(テープ容量に対する百分率).
    pub fn min_tape_recall_percentage(&self) -> u8 {
        self.min_tape_recall_percentage
    }

    /// キューの長さに基づくテープ選択の閾値.
    pub fn min_requests_for_tape_selection(&self) -> Option<usize> {
        self.min_requests_for_tape_selection
    }

    /// テープがアクティブ化の候補となるまでの最小待機時間.
    pub fn min_job_waiting_time(&self) -> Duration {
        self.min_job_waiting_time
    }

    /// ジョブの最大待機時間.
    pub fn max_job_waiting_time(&self) -> Duration {
        self.max_job_waiting_time
    }

    /// 現在`active`個のテープがアクティブな場合に、追加でアクティブ化可能なテープの数を返す.
    pub fn remaining_tape_slots(&self, active: usize) -> usize {
        self.max_active_tapes.saturating_sub(active)
    }

    /// キューの長さに基づくテープ選択が有効かどうか.
    pub fn has_min_request_count(&self) -> bool {
        self.min_requests_for_tape_selection.is_some()
    }

    /// キューの長さが、テープ選択の閾値を満たしているかどうか.
    ///
    /// キューの長さに基づく選択が無効な場合には、常に`false`を返す.
    pub fn is_request_count_sufficient(&self, count: usize) -> bool {
        self.min_requests_for_tape_selection
            .map_or(false, |min| count >= min)
    }

    /// テープのリコール量が十分かどうか.
    ///
    /// テープの容量情報が未取得の場合や、容量が`0`の場合には`false`を返す.
    pub fn is_tape_recall_volume_sufficient(&self, tape: &TapeState, recall_volume: u64) -> bool {
        match tape.capacity() {
            None | Some(0) => false,
            Some(capacity) => {
                u128::from(recall_volume) * 100
                    >= u128::from(capacity) * u128::from(self.min_tape_recall_percentage)
            }
        }
    }

    /// テープのキューイング中のジョブの中で、最も古いものが最大待機時間を超えているかどうか.
    pub fn is_oldest_tape_job_expired(&self, tape: &TapeState, now: SystemTime) -> bool {
        tape.oldest_job_arrival()
            .map_or(false, |t| self.is_expired(t, now))
    }

    /// テープに最後に到着したジョブが、最小待機時間以上経過しているかどうか.
    pub fn is_newest_tape_job_old_enough(&self, tape: &TapeState, now: SystemTime) -> bool {
        tape.newest_job_arrival()
            .map_or(false, |t| age(t, now) >= self.min_job_waiting_time)
    }

    /// ジョブが最大待機時間を超えているかどうか.
    pub fn is_job_expired(&self, job: &Job, now: SystemTime) -> bool {
        self.is_expired(job.creation_time(), now)
    }

    /// テープ同士を、キューイング中の最古のジョブの到着時刻で比較する.
    ///
    /// 最古のジョブがより古いテープが先に並ぶ.
    /// キューが空のテープは最後になる.
    pub fn compare_oldest_tape_job_age(&self, a: &TapeState, b: &TapeState) -> Ordering {
        match (a.oldest_job_arrival(), b.oldest_job_arrival()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    fn is_expired(&self, arrival: SystemTime, now: SystemTime) -> bool {
        age(arrival, now) > self.max_job_waiting_time
    }
}

/// 到着時刻から`now`までの経過時間.
///
/// 到着時刻が未来の場合(i.e., 時計が巻き戻った場合)には`0`となる.
fn age(arrival: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(arrival).unwrap_or_default()
}
