//! hakka-deck - 客家語語彙リストからAnkiデッキを生成するツール
//!
//! 漢字・声調番号付きローマ字・訳語のCSVを読み込み、声調の色付けと
//! ダイアクリティカルマーク、TTS音声を付けたAnkiパッケージ（.apkg）を出力する。
//!
//! # 主な機能
//!
//! - **声調アノテーション**: `ngai2` → `ngāi` のようなマーク付けと、声調ごとの色付け
//! - **漢字の色付け**: 発音中の声調番号の順に、漢字1文字ずつ色を付ける
//! - **TTS音声**: 香港客家語TTS APIから音声を取得（取得済みファイルは再利用）
//! - **パッケージ出力**: ノートモデル・デッキ・音声ファイルを1つの .apkg にまとめる
//!
//! # アーキテクチャ
//!
//! ```text
//! [CSV] → [vocab_source] → [deck_builder] ─→ [apkg_writer] → [.apkg]
//!                               │    ↑
//!                          [annotate] [tts_client] ← TTS API
//!                               │
//!                            [tone]
//! ```
//!
//! # 使用例
//!
//! ```
//! use hakka_deck::annotate::{colorize_characters, diacritize_pronunciation};
//!
//! let word = colorize_characters("你", "ngi2");
//! let pron = diacritize_pronunciation("ngi2");
//! assert_eq!(word, r#"<span style="color: blue;">你</span>"#);
//! assert_eq!(pron, "<span style=\"color: blue;\">ngi\u{0304}</span>");
//! ```

pub mod annotate;
pub mod apkg_writer;
pub mod cli;
pub mod config;
pub mod deck_builder;
pub mod logging;
pub mod tone;
pub mod tts_client;
pub mod types;
pub mod vocab_source;
