use serde::Serialize;
use std::path::PathBuf;

/// 語彙リストの1行
///
/// CSVから読み込んだ検証済みの語彙エントリ。
///
/// # Examples
///
/// ```
/// # use hakka_deck::types::VocabEntry;
/// let entry = VocabEntry {
///     row: 2,
///     word: "你".to_string(),
///     pronunciation: "ngi2".to_string(),
///     standard_chinese: "你".to_string(),
///     english: "you".to_string(),
/// };
/// assert_eq!(entry.audio_filename(), "你.mp3");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VocabEntry {
    /// CSV上の行番号（ヘッダー行を1行目とする）
    pub row: usize,

    /// 客家漢字
    pub word: String,

    /// 声調番号付きのローマ字表記（例: `ngai2`）
    pub pronunciation: String,

    /// 普通話（標準中国語）での表記
    pub standard_chinese: String,

    /// 英語の意味
    pub english: String,
}

impl VocabEntry {
    /// 音声ファイル名（漢字をそのままファイル名に使う）
    ///
    /// パス区切りやファイル名に使えない文字は `_` に置き換え、
    /// 音声ディレクトリの外に書き出さないようにする。
    pub fn audio_filename(&self) -> String {
        let stem: String = self
            .word
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        format!("{}.mp3", stem)
    }
}

/// カード1枚分のフィールド
///
/// ノートモデルのフィールド順（Character, Pronunciation, StandardChinese, English, Audio）
/// に対応する。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CardRecord {
    /// CSV上の行番号
    pub row: usize,

    /// 声調色付きの漢字
    pub character: String,

    /// ダイアクリティカルマーク付き・色付きの発音
    pub pronunciation: String,

    pub standard_chinese: String,

    pub english: String,

    /// `[sound:<filename>]` 形式の音声参照。音声なしの場合は空文字列
    pub audio: String,

    /// パッケージに同梱する音声ファイル
    #[serde(skip)]
    pub media_file: Option<PathBuf>,

    /// 音声取得用の元の発音（声調番号付き）
    #[serde(skip)]
    pub pronunciation_source: String,

    /// 音声ファイル名
    #[serde(skip)]
    pub audio_filename: String,
}

impl CardRecord {
    /// ノートのフィールドをモデル順に返す
    pub fn fields(&self) -> [&str; 5] {
        [
            &self.character,
            &self.pronunciation,
            &self.standard_chinese,
            &self.english,
            &self.audio,
        ]
    }

    /// 音声ファイルを関連付ける
    pub fn attach_audio(&mut self, filename: &str, path: PathBuf) {
        self.audio = sound_tag(filename);
        self.media_file = Some(path);
    }
}

/// Ankiが再生する音声参照タグ
pub fn sound_tag(filename: &str) -> String {
    format!("[sound:{}]", filename)
}

/// 行単位の処理エラー
///
/// 行の処理に失敗してもデッキ生成は継続する。
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// 必須フィールドが空または存在しない
    #[error("{row}行目: フィールド '{column}' がありません (行: {raw})")]
    MissingField {
        row: usize,
        column: String,
        raw: String,
    },

    /// 行をデコードできない
    #[error("{row}行目: 不正な行です: {reason}")]
    Malformed { row: usize, reason: String },
}

impl RowError {
    /// エラーの発生した行番号
    pub fn row(&self) -> usize {
        match self {
            RowError::MissingField { row, .. } | RowError::Malformed { row, .. } => *row,
        }
    }
}

/// デッキ生成結果の集計
#[derive(Clone, Debug, Serialize)]
pub struct DeckSummary {
    /// デッキに書き込んだカード数
    pub written: usize,

    /// 処理に失敗した行数
    pub failed: usize,

    /// 音声付きのカード数
    pub with_audio: usize,

    /// 出力ファイル
    pub output: PathBuf,
}
