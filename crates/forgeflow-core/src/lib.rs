//! Forgeflow core: GitHub Actions ランナーとの境界レイヤ
//!
//! ステップ入力・出力・フェーズ間 state・workflow command によるログ出力、
//! 実行コンテキスト (リポジトリ / ref / イベント payload)、
//! ラン単位の一時ディレクトリを提供します。

pub mod actions;
pub mod error;
pub mod github;
pub mod temp;

pub use error::{CoreError, CoreResult};
pub use github::GithubContext;
pub use temp::TempSpace;
