//! スケジューリング要求と、その応答.
use fibers::sync::oneshot;
use futures::{Future, Poll};
use std::time::Duration;
use trackable::error::ErrorKindExt;

use crate::job::FileId;
use crate::{Error, ErrorKind};

/// ファイルのステージング(テープからの読み出し)順序を決めるための要求.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRequest {
    request_id: String,
    file_id: FileId,
    lifetime: Option<Duration>,
}
impl ScheduleRequest {
    /// 新しい`ScheduleRequest`インスタンスを生成する.
    pub fn new<T: Into<String>>(request_id: T, file_id: FileId) -> Self {
        ScheduleRequest {
            request_id: request_id.into(),
            file_id,
            lifetime: None,
        }
    }

    /// ステージング後のファイルの保持期間(ピンの寿命)を設定する.
    ///
    /// スケジューラ自体はこの値を解釈せず、応答時にそのまま返すだけ.
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// 要求元のリクエストID.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// 対象ファイルのID.
    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }

    /// ピンの寿命.
    pub fn pin_lifetime(&self) -> Option<Duration> {
        self.lifetime
    }
}

/// スケジューリング要求の結果.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// ステージングを開始して良い.
    Scheduled(ScheduleRequest),

    /// 要求は失敗した.
    Failed {
        /// 元の要求.
        request: ScheduleRequest,

        /// 失敗の種類を表すコード.
        code: u32,

        /// 失敗の詳細.
        message: String,
    },
}
impl ScheduleOutcome {
    /// 元の要求を返す.
    pub fn request(&self) -> &ScheduleRequest {
        match self {
            ScheduleOutcome::Scheduled(request) => request,
            ScheduleOutcome::Failed { request, .. } => request,
        }
    }

    /// 要求が成功したかどうか.
    pub fn is_scheduled(&self) -> bool {
        match self {
            ScheduleOutcome::Scheduled(_) => true,
            ScheduleOutcome::Failed { .. } => false,
        }
    }
}

/// `Result`の非同期版.
#[derive(Debug)]
pub struct AsyncResult<T>(oneshot::Monitor<T, Error>);
impl<T> Future for AsyncResult<T> {
    type Item = T;
    type Error = Error;
    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        track!(self.0.poll().map_err(|e| e.unwrap_or_else(|| {
            ErrorKind::SchedulerTerminated
                .cause("reply dropped without completion")
                .into()
        })))
    }
}

/// 完了待ちの応答ハンドル.
///
/// 一つの要求に対して、ちょうど一つだけ存在する.
/// 完了させずに破棄した場合には、対応する`AsyncResult`は`ErrorKind::SchedulerTerminated`で終わる.
#[derive(Debug)]
pub struct PendingReply {
    request: ScheduleRequest,
    reply: oneshot::Monitored<ScheduleOutcome, Error>,
}
impl PendingReply {
    pub(crate) fn new(request: ScheduleRequest) -> (Self, AsyncResult<ScheduleOutcome>) {
        let (reply, result) = oneshot::monitor();
        (PendingReply { request, reply }, AsyncResult(result))
    }

    /// 元の要求を返す.
    pub fn request(&self) -> &ScheduleRequest {
        &self.request
    }

    /// 要求を成功として完了させる.
    pub fn success(self) {
        self.reply.exit(Ok(ScheduleOutcome::Scheduled(self.request)));
    }

    /// 要求を失敗として完了させる.
    pub fn fail<T: Into<String>>(self, code: u32, message: T) {
        let outcome = ScheduleOutcome::Failed {
            request: self.request,
            code,
            message: message.into(),
        };
        self.reply.exit(Ok(outcome));
    }

    /// 要求を受け付けずにエラーで完了させる.
    pub(crate) fn reject(self, error: Error) {
        self.reply.exit(Err(error));
    }
}
