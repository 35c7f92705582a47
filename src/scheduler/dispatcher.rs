use slog::Logger;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;
use trackable::error::ErrorKindExt;

use super::reply::{AsyncResult, PendingReply, ScheduleOutcome, ScheduleRequest};
use crate::job::{Job, JobId};
use crate::metrics::SchedulerMetrics;
use crate::strategy::SchedulingStrategy;
use crate::{Error, ErrorKind, Result};

/// 要求の受け付けと、払い出されたジョブに対応する応答の完了を担当する.
///
/// 応答ハンドル群は戦略とは別のロックで保護される.
/// 登録は常に戦略への追加よりも前に、削除は常に応答の完了よりも前に行われる.
#[derive(Debug)]
pub struct Dispatcher {
    strategy: SchedulingStrategy,
    replies: Mutex<HashMap<JobId, PendingReply>>,
    max_retrievals_per_tick: usize,
    logger: Logger,
    metrics: SchedulerMetrics,
}
impl Dispatcher {
    pub fn new(
        strategy: SchedulingStrategy,
        max_retrievals_per_tick: usize,
        logger: Logger,
        metrics: SchedulerMetrics,
    ) -> Self {
        Dispatcher {
            strategy,
            replies: Mutex::new(HashMap::new()),
            max_retrievals_per_tick,
            logger,
            metrics,
        }
    }

    pub fn strategy(&self) -> &SchedulingStrategy {
        &self.strategy
    }

    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    pub fn admit(
        &self,
        request: ScheduleRequest,
        creation_time: SystemTime,
    ) -> AsyncResult<ScheduleOutcome> {
        let job_id = JobId::new(request.request_id(), request.file_id().clone());
        let (reply, result) = PendingReply::new(request);

        let mut replies = self.replies();
        if replies.contains_key(&job_id) {
            drop(replies);
            warn!(self.logger, "Request is already scheduled: {}", job_id);
            self.metrics.duplicate_requests.increment();
            let e: Error = ErrorKind::InvalidInput
                .cause(format!("already scheduled: {}", job_id))
                .into();
            reply.reject(track!(e));
            return result;
        }
        // 完了数が受け付け数を追い越さないように、登録前に数える
        self.metrics.admitted_requests.increment();
        replies.insert(job_id.clone(), reply);
        drop(replies);

        self.strategy.add(Job::new(job_id, creation_time));
        result
    }

    /// 戦略から払い出し可能なジョブを取り出し、対応する応答を完了させる.
    ///
    /// 一回の呼び出しで取り出すジョブの数は`max_retrievals_per_tick`が上限.
    /// 完了させた応答の数を返す.
    pub fn tick(&self) -> Result<usize> {
        self.metrics.ticks.increment();
        let mut completed = 0;
        for _ in 0..self.max_retrievals_per_tick {
            let job_id = match self.strategy.remove() {
                None => break,
                Some(job_id) => job_id,
            };
            let reply = self.replies().remove(&job_id);
            if let Some(reply) = reply {
                debug!(self.logger, "Job is ready for staging: {}", job_id);
                reply.success();
                self.metrics.completed_replies.increment();
                completed += 1;
            } else {
                let e: Error = ErrorKind::InconsistentState
                    .cause(format!("no pending reply for job: {}", job_id))
                    .into();
                error!(self.logger, "{}", track!(e));
                self.metrics.orphaned_jobs.increment();
            }
        }
        Ok(completed)
    }

    pub fn info(&self) -> String {
        let pending = self.replies().len();
        format!(
            "{}\nprovider: {}\npending replies: {}",
            self.strategy.snapshot(),
            self.strategy.informant().describe(),
            pending
        )
    }

    /// 登録と削除はいずれも一操作で完結するので、ロックが汚染されていても中身は整合している.
    fn replies(&self) -> MutexGuard<HashMap<JobId, PendingReply>> {
        self.replies.lock().unwrap_or_else(|e| e.into_inner())
    }
}
