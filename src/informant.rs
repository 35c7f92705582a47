//! テープのメタデータ(ファイルの位置・テープの容量)の取得.
//!
//! メタデータの実際の取得元は外部のシステムであり、[TapeInfoProvider]トレイトを介して抽象化されている.
//!
//! スケジューラはプロバイダを直接呼び出さず、[TapeInformant]を経由する.
//! [TapeInformant]は問い合わせを一定の大きさのバッチに分割し、
//! プロバイダのエラーを「今回は新しい情報なし」として吸収する.
//!
//! [TapeInfoProvider]: trait.TapeInfoProvider.html
//! [TapeInformant]: struct.TapeInformant.html
use slog::{Discard, Logger};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::job::FileId;
use crate::tape::{FileInfo, TapeInfo};
use crate::{ErrorKind, Result};

/// テープのメタデータの提供元.
///
/// 問い合わせたキーの全てが結果に含まれている必要はない.
/// 結果に含まれていないキーは「現時点では不明」として扱われる.
pub trait TapeInfoProvider: Send + Sync {
    /// 指定されたファイル群の、テープ上の位置情報を返す.
    fn file_infos(&self, file_ids: &[FileId]) -> Result<HashMap<FileId, FileInfo>>;

    /// 指定されたテープ群の、容量情報を返す.
    fn tape_infos(&self, tapes: &[String]) -> Result<HashMap<String, TapeInfo>>;

    /// 提供元の説明を返す.
    ///
    /// 運用時の状態表示にのみ使われる.
    fn describe(&self) -> String {
        String::new()
    }

    /// 提供元に、情報の再読み込みを要求する.
    ///
    /// 再読み込みが行われた場合には`true`を返す.
    /// デフォルト実装は何もせずに`false`を返す.
    fn reload(&self) -> Result<bool> {
        Ok(false)
    }
}

/// メタデータ提供元へのアダプタ.
pub struct TapeInformant {
    provider: Box<dyn TapeInfoProvider>,
    max_batch_size: usize,
    logger: Logger,
}
impl TapeInformant {
    /// 一回の問い合わせに含めるキーの数のデフォルト値.
    pub const DEFAULT_MAX_BATCH_SIZE: usize = 10_000;

    /// 新しい`TapeInformant`インスタンスを生成する.
    pub fn new<P>(provider: P) -> Self
    where
        P: TapeInfoProvider + 'static,
    {
        TapeInformant {
            provider: Box::new(provider),
            max_batch_size: Self::DEFAULT_MAX_BATCH_SIZE,
            logger: Logger::root(Discard, o!()),
        }
    }

    /// 一回の問い合わせに含めるキーの最大数を設定する.
    ///
    /// # Errors
    ///
    /// `0`が指定された場合には、種類が`ErrorKind::InvalidInput`のエラーが返される.
    pub fn max_batch_size(mut self, n: usize) -> Result<Self> {
        track_assert!(n > 0, ErrorKind::InvalidInput);
        self.max_batch_size = n;
        Ok(self)
    }

    /// ロガーを設定する.
    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// 指定されたファイル群の位置情報を取得する.
    ///
    /// 失敗したバッチは結果に含まれず、呼び出し側には取得できた分のみが返される.
    /// 二つ目の返り値は、失敗したバッチが存在したかどうか.
    pub fn file_infos(&self, file_ids: &[FileId]) -> (HashMap<FileId, FileInfo>, bool) {
        let mut infos = HashMap::new();
        let mut failed = false;
        for batch in file_ids.chunks(self.max_batch_size) {
            match track!(self.provider.file_infos(batch)) {
                Ok(found) => infos.extend(found),
                Err(e) => {
                    warn!(self.logger, "Cannot retrieve file infos: {}", e; "files" => batch.len());
                    failed = true;
                }
            }
        }
        (infos, failed)
    }

    /// 指定されたテープ群の容量情報を取得する.
    ///
    /// エラーの扱いは`file_infos`と同様.
    pub fn tape_infos(&self, tapes: &[String]) -> (HashMap<String, TapeInfo>, bool) {
        let mut infos = HashMap::new();
        let mut failed = false;
        for batch in tapes.chunks(self.max_batch_size) {
            match track!(self.provider.tape_infos(batch)) {
                Ok(found) => infos.extend(found),
                Err(e) => {
                    warn!(self.logger, "Cannot retrieve tape infos: {}", e; "tapes" => batch.len());
                    failed = true;
                }
            }
        }
        (infos, failed)
    }

    /// 提供元の説明を返す.
    pub fn describe(&self) -> String {
        self.provider.describe()
    }

    /// 提供元に再読み込みを要求する.
    pub fn reload(&self) -> Result<bool> {
        track!(self.provider.reload())
    }
}
impl fmt::Debug for TapeInformant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TapeInformant")
            .field("provider", &self.provider.describe())
            .field("max_batch_size", &self.max_batch_size)
            .finish()
    }
}

/// メモリ上に情報を保持する`TapeInfoProvider`実装.
///
/// 主にテストや、静的な情報で運用する場合に使われる.
/// クローンしたインスタンス同士は同じ情報を共有する.
#[derive(Debug, Clone, Default)]
pub struct MemoryTapeInfoProvider {
    inner: Arc<Mutex<MemoryTapeInfos>>,
}
#[derive(Debug, Default)]
struct MemoryTapeInfos {
    files: HashMap<FileId, FileInfo>,
    tapes: HashMap<String, TapeInfo>,
    queries: usize,
}
impl MemoryTapeInfoProvider {
    /// 空の`MemoryTapeInfoProvider`インスタンスを生成する.
    pub fn new() -> Self {
        Self::default()
    }

    /// ファイルの位置情報を登録する.
    pub fn add_file_info(&self, file_id: FileId, info: FileInfo) {
        self.lock().files.insert(file_id, info);
    }

    /// テープの容量情報を登録する.
    pub fn add_tape_info<T: Into<String>>(&self, tape: T, info: TapeInfo) {
        self.lock().tapes.insert(tape.into(), info);
    }

    /// これまでに受け付けた問い合わせの回数を返す.
    pub fn queries(&self) -> usize {
        self.lock().queries
    }

    fn lock(&self) -> std::sync::MutexGuard<MemoryTapeInfos> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
impl TapeInfoProvider for MemoryTapeInfoProvider {
    fn file_infos(&self, file_ids: &[FileId]) -> Result<HashMap<FileId, FileInfo>> {
        let mut inner = self.lock();
        inner.queries += 1;
        Ok(file_ids
            .iter()
            .filter_map(|id| inner.files.get(id).map(|info| (id.clone(), info.clone())))
            .collect())
    }

    fn tape_infos(&self, tapes: &[String]) -> Result<HashMap<String, TapeInfo>> {
        let mut inner = self.lock();
        inner.queries += 1;
        Ok(tapes
            .iter()
            .filter_map(|t| inner.tapes.get(t).map(|info| (t.clone(), *info)))
            .collect())
    }

    fn describe(&self) -> String {
        let inner = self.lock();
        format!(
            "in-memory ({} files, {} tapes)",
            inner.files.len(),
            inner.tapes.len()
        )
    }
}
