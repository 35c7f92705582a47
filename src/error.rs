/// crate固有のエラー型.
#[derive(Debug, Clone, TrackableError)]
pub struct Error(trackable::error::TrackableError<ErrorKind>);

/// 発生し得るエラーの種別.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 入力が不正.
    ///
    /// 不正な設定値や、既に登録済みのリクエストの再登録、等.
    ///
    /// # 典型的な対応策
    ///
    /// - 利用者側のプログラム(ないし設定)を修正して入力を正しくする
    InvalidInput,

    /// テープのメタデータの取得に失敗した.
    ///
    /// スケジューラ内部では、このエラーは「今回は新しい情報なし」として扱われ、
    /// 次回のリフレッシュ時に自動的に再試行される.
    ///
    /// # 典型的な対応策
    ///
    /// - メタデータの提供元(e.g., テープ管理システム)の状態を確認する
    MetadataUnavailable,

    /// スケジューラが停止しており、応答が返されることはない.
    ///
    /// 保留中のリクエストの応答ハンドルが、完了前に破棄された場合に返される.
    ///
    /// # 典型的な対応策
    ///
    /// - スケジューラを再起動した上で、リクエストを再発行する
    SchedulerTerminated,

    /// 内部状態が不整合に陥っている.
    ///
    /// プログラムにバグがあることを示している.
    ///
    /// # 典型的な対応策
    ///
    /// - バグ修正を行ってプログラムを更新する
    InconsistentState,

    /// その他エラー.
    Other,
}
impl trackable::error::ErrorKind for ErrorKind {}
