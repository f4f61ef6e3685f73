//! Cloudplane の設定読み込み
//!
//! YAML の設定ファイルを探索して [`ControlPlaneConfig`] に変換する。
//! 設定ファイルが無い場合は全項目デフォルト値で動作する。

pub mod error;

pub use error::*;

use cloudplane_flow::{DispatcherConfig, PollingConfig, UnwiredAcceptance};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 設定ファイルパスを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "CLOUDPLANE_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["cloudplane.local.yaml", "cloudplane.yaml"];

/// コントロールプレーン全体の設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    pub flow: FlowSettings,
    pub polling: PollingSettings,
    pub aws: AwsSettings,
}

/// フロー受付の設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSettings {
    /// ランタイムの受付応答を待つ秒数
    pub acceptance_timeout_secs: u64,
    /// 受付制御に参加しないフローの扱い
    pub unwired_acceptance: UnwiredAcceptance,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            acceptance_timeout_secs: 10,
            unwired_acceptance: UnwiredAcceptance::Reject,
        }
    }
}

/// 状態収束待ちのポーリング設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub sleep_time_secs: u64,
    pub duration_mins: u64,
    pub stop_on_error: bool,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            sleep_time_secs: 10,
            duration_mins: 60,
            stop_on_error: true,
        }
    }
}

/// AWS 認証情報検証の設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSettings {
    /// 必要なアクションを列挙した IAM ポリシー (Base64)。未指定なら組み込みのもの
    pub credential_policies_json: Option<String>,
    pub government_cloud: bool,
    pub default_region: String,
    /// ロールを引き受ける側のアカウント ID
    pub account_id: Option<String>,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            credential_policies_json: None,
            government_cloud: false,
            default_region: "us-west-1".to_string(),
            account_id: None,
        }
    }
}

impl ControlPlaneConfig {
    /// YAML 文字列から読み込む
    pub fn from_yaml(source: &str, path: &Path) -> Result<Self> {
        let config: Self = serde_yaml::from_str(source).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 指定パスの設定ファイルを読み込む
    pub fn load_from(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded config file: {}", path.display());
        Self::from_yaml(&source, path)
    }

    /// 設定ファイルを探索して読み込む。見つからなければデフォルト値
    pub fn load() -> Result<Self> {
        match find_config_file() {
            Ok(path) => Self::load_from(&path),
            Err(ConfigError::ConfigFileNotFound) => {
                tracing::info!("No config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.flow.acceptance_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "flow.acceptance_timeout_secs".to_string(),
                message: "0 より大きい値を指定してください".to_string(),
            });
        }
        if self.polling.sleep_time_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "polling.sleep_time_secs".to_string(),
                message: "0 より大きい値を指定してください".to_string(),
            });
        }
        let Some(deadline_secs) = self.polling.duration_mins.checked_mul(60) else {
            return Err(ConfigError::InvalidValue {
                key: "polling.duration_mins".to_string(),
                message: "期限が大きすぎます".to_string(),
            });
        };
        if deadline_secs < self.polling.sleep_time_secs {
            return Err(ConfigError::InvalidValue {
                key: "polling.duration_mins".to_string(),
                message: "ポーリング間隔より短い期限は指定できません".to_string(),
            });
        }
        Ok(())
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            acceptance_timeout: Duration::from_secs(self.flow.acceptance_timeout_secs),
            unwired_acceptance: self.flow.unwired_acceptance,
        }
    }

    pub fn polling_config(&self) -> PollingConfig {
        PollingConfig::new(
            Duration::from_secs(self.polling.sleep_time_secs),
            Duration::from_secs(self.polling.duration_mins.saturating_mul(60)),
        )
        .with_stop_on_exception(self.polling.stop_on_error)
    }
}

/// Cloudplane のグローバル設定ディレクトリを取得 (作成はしない)
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("cloudplane"))
        .ok_or(ConfigError::ConfigDirNotFound)
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 CLOUDPLANE_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: cloudplane.local.yaml, cloudplane.yaml
/// 3. ./.cloudplane/ ディレクトリ内: 同様の順序
/// 4. ~/.config/cloudplane/cloudplane.yaml (グローバル設定)
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points to a missing file: {}", CONFIG_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;
    let search_dirs = [current_dir.clone(), current_dir.join(".cloudplane")];

    for dir in search_dirs.iter().filter(|d| d.is_dir()) {
        for filename in &CANDIDATES {
            let path = dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("cloudplane.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}
