use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 設定ファイルの既定パス
pub const DEFAULT_CONFIG_PATH: &str = "hakka-deck.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub columns: ColumnConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub deck: DeckConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// 入出力パス設定
///
/// # デフォルト値
///
/// - `csv_path`: "./Hakka Vocabulary.csv"
/// - `output_deck_path`: "./hakka_language_deck_with_diacritics_and_sound.apkg"
/// - `log_file`: "./hakka_with_diacritics_and_sound_anki.log"
/// - `audio_dir`: "./audio"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
    #[serde(default = "default_output_deck_path")]
    pub output_deck_path: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
}

/// CSVの列名設定
///
/// 語彙リストのヘッダー名。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColumnConfig {
    #[serde(default = "default_word_column")]
    pub word: String,
    #[serde(default = "default_pronunciation_column")]
    pub pronunciation: String,
    #[serde(default = "default_standard_chinese_column")]
    pub standard_chinese: String,
    #[serde(default = "default_english_column")]
    pub english: String,
}

/// 客家語TTS API 設定
///
/// 参考: https://hkilang.github.io/TTS/
///
/// # デフォルト値
///
/// - `api_url`: "https://Chaak2.pythonanywhere.com/TTS/hakka"
/// - `voice`: "male"
/// - `speed`: "1"
/// - `timeout_seconds`: 10 秒
/// - `concurrency`: 4 (同時リクエスト数)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TtsConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_speed")]
    pub speed: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// デッキ・ノートモデル設定
///
/// IDは既存デッキに上書きインポートできるよう固定値を既定とする。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeckConfig {
    #[serde(default = "default_deck_id")]
    pub deck_id: i64,
    #[serde(default = "default_deck_name")]
    pub deck_name: String,
    #[serde(default = "default_model_id")]
    pub model_id: i64,
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

/// 出力設定
///
/// # デフォルト値
///
/// - `log_level`: "info"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default functions
fn default_csv_path() -> PathBuf {
    PathBuf::from("./Hakka Vocabulary.csv")
}

fn default_output_deck_path() -> PathBuf {
    PathBuf::from("./hakka_language_deck_with_diacritics_and_sound.apkg")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("./hakka_with_diacritics_and_sound_anki.log")
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("./audio")
}

fn default_word_column() -> String {
    "客家汉字".to_string()
}

fn default_pronunciation_column() -> String {
    "Hakka Pronunciation".to_string()
}

fn default_standard_chinese_column() -> String {
    "普通中文".to_string()
}

fn default_english_column() -> String {
    "English Definition".to_string()
}

fn default_api_url() -> String {
    "https://Chaak2.pythonanywhere.com/TTS/hakka".to_string()
}

fn default_voice() -> String {
    "male".to_string()
}

fn default_speed() -> String {
    "1".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_concurrency() -> usize {
    4
}

fn default_deck_id() -> i64 {
    2059400110
}

fn default_deck_name() -> String {
    "Fui Yong Hakka Language Deck with Diacritics & Audio".to_string()
}

fn default_model_id() -> i64 {
    1607392319
}

fn default_model_name() -> String {
    "Hakka Flashcard Model with Diacritics & Audio".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            output_deck_path: default_output_deck_path(),
            log_file: default_log_file(),
            audio_dir: default_audio_dir(),
        }
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            word: default_word_column(),
            pronunciation: default_pronunciation_column(),
            standard_chinese: default_standard_chinese_column(),
            english: default_english_column(),
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            voice: default_voice(),
            speed: default_speed(),
            timeout_seconds: default_timeout_seconds(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            deck_id: default_deck_id(),
            deck_name: default_deck_name(),
            model_id: default_model_id(),
            model_name: default_model_name(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// TOML形式の設定ファイルをパースしてConfig構造体を生成する。
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use hakka_deck::config::Config;
    /// let config = Config::from_file("hakka-deck.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// 設定ファイルがあれば読み込む
    ///
    /// ファイルが存在しない場合は `None` を返す。ロガー初期化前に呼ばれるため、
    /// デフォルト設定へのフォールバックは呼び出し側でログに残す。
    ///
    /// # Errors
    ///
    /// ファイルが存在するがパースに失敗した場合にエラーを返す。
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        if path.as_ref().exists() {
            Self::from_file(path).map(Some)
        } else {
            Ok(None)
        }
    }
}
