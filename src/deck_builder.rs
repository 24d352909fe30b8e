use crate::annotate::{colorize_characters, diacritize_pronunciation, strip_html};
use crate::apkg_writer::ApkgWriter;
use crate::cli::CliArgs;
use crate::config::Config;
use crate::tts_client::AudioSource;
use crate::types::{CardRecord, DeckSummary, RowError, VocabEntry};
use crate::vocab_source::RowResult;
use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};
use rayon::prelude::*;
use std::sync::Arc;

/// カード生成結果
pub type CardResult = std::result::Result<CardRecord, RowError>;

/// デッキ生成オプション
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// 処理する行数の上限（`--test`）
    pub row_limit: Option<usize>,
    /// 音声を取得しない（`--no-audio`）
    pub no_audio: bool,
}

impl From<&CliArgs> for BuildOptions {
    fn from(args: &CliArgs) -> Self {
        Self {
            row_limit: args.row_limit(),
            no_audio: args.no_audio,
        }
    }
}

/// 語彙エントリからカードを組み立てる（音声なし）
pub fn annotate_entry(entry: &VocabEntry) -> CardRecord {
    CardRecord {
        row: entry.row,
        character: colorize_characters(&entry.word, &entry.pronunciation),
        pronunciation: diacritize_pronunciation(&entry.pronunciation),
        standard_chinese: entry.standard_chinese.clone(),
        english: entry.english.clone(),
        audio: String::new(),
        media_file: None,
        pronunciation_source: entry.pronunciation.clone(),
        audio_filename: entry.audio_filename(),
    }
}

/// 語彙リストからデッキを生成するパイプライン
///
/// 行の読み込み結果 → 声調アノテーション → 音声取得 → パッケージ書き出し。
/// 行単位のエラーはログに記録して処理を継続する。
pub struct DeckBuilder<'a> {
    config: &'a Config,
    options: BuildOptions,
    audio: Option<Arc<dyn AudioSource>>,
}

impl<'a> DeckBuilder<'a> {
    pub fn new(
        config: &'a Config,
        options: BuildOptions,
        audio: Option<Arc<dyn AudioSource>>,
    ) -> Self {
        Self {
            config,
            options,
            audio,
        }
    }

    fn audio_source(&self) -> Option<&Arc<dyn AudioSource>> {
        if self.options.no_audio {
            None
        } else {
            self.audio.as_ref()
        }
    }

    /// 全行のカードを生成（順序は入力順）
    pub async fn build_cards(&self, rows: Vec<RowResult>) -> Vec<CardResult> {
        let rows: Vec<RowResult> = match self.options.row_limit {
            Some(limit) => rows.into_iter().take(limit).collect(),
            None => rows,
        };

        // 1. 声調アノテーション（純粋関数なので並列に処理）
        let annotated: Vec<CardResult> = rows
            .into_par_iter()
            .map(|row| row.map(|entry| annotate_entry(&entry)))
            .collect();

        // 2. 音声取得
        let Some(source) = self.audio_source() else {
            return annotated;
        };

        let concurrency = self.config.tts.concurrency.max(1);
        stream::iter(annotated)
            .map(|result| {
                let source = Arc::clone(source);
                async move {
                    match result {
                        Ok(card) => Ok(attach_audio(source.as_ref(), card).await),
                        Err(e) => Err(e),
                    }
                }
            })
            .buffered(concurrency)
            .collect::<Vec<CardResult>>()
            .await
    }

    /// デッキを生成してファイルに書き出す
    ///
    /// # Errors
    ///
    /// 音声ディレクトリの作成またはパッケージの書き出しに失敗した場合にエラーを返す。
    /// 行単位のエラーは集計に含めるだけでエラーにはしない。
    pub async fn run(&self, rows: Vec<RowResult>) -> Result<DeckSummary> {
        log::info!("Ankiデッキを作成しています...");

        if let Some(limit) = self.options.row_limit {
            log::info!("テストモード: 先頭{}行のみ処理します", limit);
        }

        if self.audio_source().is_some() {
            let audio_dir = &self.config.paths.audio_dir;
            tokio::fs::create_dir_all(audio_dir)
                .await
                .with_context(|| format!("音声ディレクトリの作成に失敗: {:?}", audio_dir))?;
        } else {
            log::info!("音声の取得をスキップします");
        }

        let results = self.build_cards(rows).await;
        let (succeeded, failed): (Vec<CardResult>, Vec<CardResult>) =
            results.into_iter().partition(|r| r.is_ok());
        let cards: Vec<CardRecord> = succeeded.into_iter().filter_map(Result::ok).collect();
        let failures: Vec<RowError> = failed.into_iter().filter_map(Result::err).collect();

        for error in &failures {
            log::error!("行の処理に失敗しました: {}", error);
        }
        for card in &cards {
            log::debug!(
                "カード作成: {}行目 {} [{}]",
                card.row,
                strip_html(&card.character),
                strip_html(&card.pronunciation)
            );
        }

        log::info!("Ankiデッキを保存しています...");
        let output = &self.config.paths.output_deck_path;
        let stats = ApkgWriter::new(&self.config.deck).write(output, &cards)?;
        log::info!(
            "Ankiデッキを作成しました: {:?} (カード {}枚, 音声 {}件, 失敗 {}行)",
            output,
            stats.notes,
            stats.media,
            failures.len()
        );

        Ok(DeckSummary {
            written: cards.len(),
            failed: failures.len(),
            with_audio: cards.iter().filter(|c| c.media_file.is_some()).count(),
            output: output.clone(),
        })
    }
}

async fn attach_audio(source: &dyn AudioSource, mut card: CardRecord) -> CardRecord {
    log::debug!("TTSテキスト: {}", card.pronunciation_source);
    match source
        .fetch(&card.pronunciation_source, &card.audio_filename)
        .await
    {
        Ok(audio) => {
            if audio.cached {
                log::debug!("{}行目: 既存の音声ファイルを使用: {}", card.row, audio.filename);
            } else {
                log::info!("{}行目: 音声を保存しました: {}", card.row, audio.filename);
            }
            card.attach_audio(&audio.filename, audio.path)
        }
        Err(e) => {
            log::error!(
                "{}行目: 音声の取得に失敗しました [{}]: {}",
                card.row,
                e.kind(),
                e
            );
        }
    }
    card
}
