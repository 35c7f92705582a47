//! Tape Recall Scheduler.
//!
//! `tapesched`は、テープに格納されたファイルのステージング(読み出し)要求を、
//! テープ単位でまとめてから払い出すためのスケジューラ.
//!
//! # 特徴
//!
//! - 同じテープを対象とする要求群をまとめることで、テープのマウント回数を抑える
//! - 同時にアクティブ化(i.e., マウント)するテープの数には上限を設けられる
//! - どのテープをアクティブ化するかは、以下の規則で決定される:
//!   - 最大待機時間を超えたジョブを持つテープ(最古のものから)
//!   - リコール量(ステージングされるデータ量)がテープ容量に対して十分なテープ
//!   - キューが十分に長いテープ
//! - 最大待機時間を超えたジョブは、規則に関わらず必ず払い出される
//!   - ファイルの位置情報が取得できないジョブも、いずれは払い出される
//! - ファイルやテープのメタデータは外部の提供元から取得され、その呼び出しは一定間隔に制限される
//!
//! # モジュールの依存関係
//!
//! ```text
//! scheduler => strategy => { requirements, informant } => { job, tape, clock }
//! ```
//!
//! - [scheduler]モジュール:
//!   - 主に[Scheduler]構造体を提供
//!   - `tapesched`の利用者が直接触るのはこの構造体
//!   - 要求の受け付けと、タイマースレッドによる定期的な払い出しを担当する
//! - [strategy]モジュール:
//!   - 主に[SchedulingStrategy]構造体を提供
//!   - 全ての未払い出しジョブを保持し、テープのアクティブ化と払い出しの順番を決定する
//! - [requirements]モジュール:
//!   - テープのアクティブ化の条件を表す[RequirementsChecker]を提供
//! - [informant]モジュール:
//!   - メタデータの提供元を表す[TapeInfoProvider]トレイトを提供
//!
//! [scheduler]: ./scheduler/index.html
//! [Scheduler]: ./scheduler/struct.Scheduler.html
//! [strategy]: ./strategy/index.html
//! [SchedulingStrategy]: ./strategy/struct.SchedulingStrategy.html
//! [requirements]: ./requirements/index.html
//! [RequirementsChecker]: ./requirements/struct.RequirementsChecker.html
//! [informant]: ./informant/index.html
//! [TapeInfoProvider]: ./informant/trait.TapeInfoProvider.html
#![warn(missing_docs)]
extern crate fibers;
#[cfg(test)]
extern crate fibers_global;
extern crate futures;
extern crate prometrics;
#[macro_use]
extern crate trackable;
#[macro_use]
extern crate slog;

pub use crate::error::{Error, ErrorKind};

pub mod clock;
pub mod informant;
pub mod job;
pub mod metrics;
pub mod requirements;
pub mod scheduler;
pub mod strategy;
pub mod tape;

mod error;

/// crate固有の`Result`型.
pub type Result<T> = std::result::Result<T, Error>;
