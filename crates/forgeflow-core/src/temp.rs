//! ラン単位の一時ディレクトリ
//!
//! main フェーズで遅延作成し、state (`tempDir`) に記録して post フェーズと
//! 共有します。削除は post フェーズのみ (ディレクトリごと)。

use crate::actions;
use crate::error::{CoreError, CoreResult};
use rand::RngCore;
use rand::rngs::OsRng;
use std::path::{Path, PathBuf};

const STATE_KEY: &str = "tempDir";
const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const NAME_LEN: usize = 10;
const MAX_TRIES: usize = 20;

/// ラン単位の一時ディレクトリ
#[derive(Debug, Clone)]
pub struct TempSpace {
    dir: PathBuf,
}

impl TempSpace {
    /// 一時ディレクトリを取得 (state に記録済みならそれを再利用)
    pub fn acquire() -> CoreResult<Self> {
        if let Some(dir) = actions::get_state(STATE_KEY) {
            return Ok(Self { dir: dir.into() });
        }

        let dir = tempfile::Builder::new()
            .prefix("forgeflow-")
            .tempdir()?
            .keep();
        actions::save_state(STATE_KEY, &dir.to_string_lossy())?;
        Ok(Self { dir })
    }

    /// post フェーズ用: state に記録されたディレクトリのみ返す
    pub fn from_state() -> Option<Self> {
        actions::get_state(STATE_KEY).map(|dir| Self { dir: dir.into() })
    }

    /// 任意のディレクトリを使う (テスト用)
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// 衝突しないランダム名の一時ファイルパスを割り当てる
    ///
    /// 62 文字アルファベットから OS 乱数で 10 文字。20 回衝突したら諦める。
    pub fn random_file(&self) -> CoreResult<PathBuf> {
        for _ in 0..MAX_TRIES {
            let mut bytes = [0u8; NAME_LEN];
            OsRng.fill_bytes(&mut bytes);
            let name: String = bytes
                .iter()
                .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
                .collect();

            let path = self.dir.join(name);
            if !path.exists() {
                return Ok(path);
            }
        }
        Err(CoreError::TempFileExhausted)
    }

    /// ビルダーが image ID を書き込むファイル
    pub fn iidfile(&self) -> PathBuf {
        self.dir.join("iidfile")
    }

    /// ビルダーがメタデータ JSON を書き込むファイル
    pub fn metadata_file(&self) -> PathBuf {
        self.dir.join("metadata-file")
    }

    /// ディレクトリごと削除 (post フェーズ専用)
    pub fn remove(self) -> CoreResult<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}
