//! スケジューリング対象のジョブ関連のデータ構造群.
//!
//! "ジョブ"とは、あるファイルをテープからステージングして欲しい、という一つのリコール要求のこと.
//! 各ジョブは「外部から与えられたリクエストID」と「対象ファイルの名前空間上のID」の組で一意に識別される.
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use crate::{Error, ErrorKind, Result};

/// 名前空間上でファイルを識別するためのID (e.g., PNFS ID).
#[derive(Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct FileId(String);
impl FileId {
    /// 新しい`FileId`インスタンスを生成する.
    ///
    /// 文字列の妥当性は検査されない.
    /// 検査が必要な場合には`FileId::from_str`を使用すること.
    pub fn new<T: Into<String>>(id: T) -> Self {
        FileId(id.into())
    }

    /// IDの文字列表現を返す.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl FromStr for FileId {
    type Err = Error;

    /// 文字列から`FileId`を生成する.
    ///
    /// # Errors
    ///
    /// 文字列が空、ないし空白文字を含む場合には、種類が`ErrorKind::InvalidInput`のエラーが返される.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapesched::ErrorKind;
    /// use tapesched::job::FileId;
    ///
    /// assert_eq!("0000A1B2".parse::<FileId>().ok(), Some(FileId::new("0000A1B2")));
    /// assert_eq!("".parse::<FileId>().err().map(|e| *e.kind()), Some(ErrorKind::InvalidInput));
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        track_assert!(!s.is_empty(), ErrorKind::InvalidInput, "empty file id");
        if s.chars().any(char::is_whitespace) {
            track_panic!(ErrorKind::InvalidInput, "malformed file id: {:?}", s);
        }
        Ok(FileId::new(s))
    }
}
impl<'a> From<&'a str> for FileId {
    fn from(f: &'a str) -> Self {
        FileId::new(f)
    }
}
impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, r#"FileId("{}")"#, self.0)
    }
}
impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// ジョブの識別子.
///
/// 文字列表現は`"${request_id}:${file_id}"`となる.
#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct JobId {
    request_id: String,
    file_id: FileId,
}
impl JobId {
    /// 新しい`JobId`インスタンスを生成する.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapesched::job::{FileId, JobId};
    ///
    /// let id = JobId::new("10", FileId::new("/tape/file10.txt"));
    /// assert_eq!(id.to_string(), "10:/tape/file10.txt");
    /// ```
    pub fn new<T: Into<String>>(request_id: T, file_id: FileId) -> Self {
        JobId {
            request_id: request_id.into(),
            file_id,
        }
    }

    /// リクエストIDを返す.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// 対象ファイルのIDを返す.
    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }
}
impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.request_id, self.file_id)
    }
}

/// スケジューラのキューに格納されるリコールジョブ.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    creation_time: SystemTime,
    file_size: Option<u64>,
    tape_info_requested: bool,
}
impl Job {
    /// 新しい`Job`インスタンスを生成する.
    ///
    /// `creation_time`はジョブの到着時刻で、待機時間の判定に用いられる.
    pub fn new(id: JobId, creation_time: SystemTime) -> Self {
        Job {
            id,
            creation_time,
            file_size: None,
            tape_info_requested: false,
        }
    }

    /// ジョブの識別子を返す.
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// 対象ファイルのIDを返す.
    pub fn file_id(&self) -> &FileId {
        self.id.file_id()
    }

    /// ジョブの到着時刻を返す.
    pub fn creation_time(&self) -> SystemTime {
        self.creation_time
    }

    /// 対象ファイルのサイズを返す.
    ///
    /// テープのメタデータが取得されるまでは`None`となる.
    pub fn file_size(&self) -> Option<u64> {
        self.file_size
    }

    /// テープ上の位置情報の取得が既に試みられたかどうか.
    pub fn tape_info_requested(&self) -> bool {
        self.tape_info_requested
    }

    pub(crate) fn set_file_size(&mut self, size: u64) {
        self.file_size = Some(size);
    }

    pub(crate) fn mark_tape_info_requested(&mut self) {
        self.tape_info_requested = true;
    }
}
