use crate::config::TtsConfig;
use anyhow::Context;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{StatusCode, Url};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// 取得した音声ファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAudio {
    /// パッケージ内で参照するファイル名
    pub filename: String,
    /// ローカルのファイルパス
    pub path: PathBuf,
    /// 既存ファイルを再利用した場合は true
    pub cached: bool,
}

/// 音声取得エラー
///
/// いずれも一時的な失敗として扱い、リトライはしない。
#[derive(thiserror::Error, Debug)]
pub enum AudioFetchError {
    #[error("HTTPエラー - ステータスコード: {status}")]
    Http { status: StatusCode },

    #[error("接続エラー: {0}")]
    Connection(#[source] reqwest::Error),

    #[error("タイムアウト: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("リクエストエラー: {0}")]
    Request(#[source] reqwest::Error),

    #[error("TTS URLが不正: {0}")]
    Url(String),

    #[error("音声ファイルの書き込みに失敗: {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AudioFetchError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AudioFetchError::Timeout(err)
        } else if err.is_connect() {
            AudioFetchError::Connection(err)
        } else if let Some(status) = err.status() {
            AudioFetchError::Http { status }
        } else {
            AudioFetchError::Request(err)
        }
    }

    /// ログ用の分類名
    pub fn kind(&self) -> &'static str {
        match self {
            AudioFetchError::Http { .. } => "http",
            AudioFetchError::Connection(_) => "connection",
            AudioFetchError::Timeout(_) => "timeout",
            AudioFetchError::Request(_) => "request",
            AudioFetchError::Url(_) => "url",
            AudioFetchError::Io { .. } => "io",
        }
    }
}

/// 音声ソースの共通トレイト
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// 発音（声調番号付き）の音声を取得し、`filename` として保存する
    async fn fetch(&self, pronunciation: &str, filename: &str)
        -> Result<FetchedAudio, AudioFetchError>;
}

/// 香港客家語 TTS API クライアント
///
/// - TTS: https://hkilang.github.io/TTS/
/// - API: https://github.com/hkilang/TTS-API
///
/// 保存先に同名ファイルがあればダウンロードをスキップする。
pub struct HakkaTtsClient {
    config: TtsConfig,
    audio_dir: PathBuf,
    client: reqwest::Client,
}

impl HakkaTtsClient {
    pub fn new<P: AsRef<Path>>(config: &TtsConfig, audio_dir: P) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("TTS API HTTPクライアント作成失敗")?;

        Ok(Self {
            config: config.clone(),
            audio_dir: audio_dir.as_ref().to_path_buf(),
            client,
        })
    }

    /// リクエストURLを組み立てる
    ///
    /// 発音はパスセグメントとしてパーセントエンコードされる。
    pub fn request_url(&self, pronunciation: &str) -> Result<Url, AudioFetchError> {
        let mut url =
            Url::parse(&self.config.api_url).map_err(|e| AudioFetchError::Url(e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AudioFetchError::Url(self.config.api_url.clone()))?;
            segments.pop_if_empty().push(pronunciation);
        }
        url.query_pairs_mut()
            .append_pair("voice", &self.config.voice)
            .append_pair("speed", &self.config.speed);
        Ok(url)
    }

    async fn download(&self, url: Url, path: &Path) -> Result<(), AudioFetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(AudioFetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AudioFetchError::Http { status });
        }

        let io_err = |source| AudioFetchError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::create(path).await.map_err(io_err)?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(AudioFetchError::from_reqwest)?;
            file.write_all(&chunk).await.map_err(io_err)?;
        }
        file.flush().await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl AudioSource for HakkaTtsClient {
    async fn fetch(
        &self,
        pronunciation: &str,
        filename: &str,
    ) -> Result<FetchedAudio, AudioFetchError> {
        let path = self.audio_dir.join(filename);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            log::info!("音声ファイルは既に存在します。ダウンロードをスキップ: {}", filename);
            return Ok(FetchedAudio {
                filename: filename.to_string(),
                path,
                cached: true,
            });
        }

        let url = self.request_url(pronunciation)?;
        log::info!("TTS取得: {}", url);

        // ダウンロードごとに専用の一時ファイルへ書き、完了後に同名ファイルがなければ配置する。
        // 一時ファイルは失敗時にドロップで削除される
        let partial = tempfile::Builder::new()
            .prefix(".tts-")
            .suffix(".part")
            .tempfile_in(&self.audio_dir)
            .map_err(|source| AudioFetchError::Io {
                path: self.audio_dir.clone(),
                source,
            })?;
        self.download(url, partial.path()).await?;

        if let Err(e) = partial.persist_noclobber(&path) {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                // 同じファイル名の取得が先に完了した
                log::info!("音声ファイルは既に存在します。取得結果を破棄: {}", filename);
                return Ok(FetchedAudio {
                    filename: filename.to_string(),
                    path,
                    cached: true,
                });
            }
            return Err(AudioFetchError::Io {
                path,
                source: e.error,
            });
        }

        log::info!("音声を保存しました: {:?}", path);
        Ok(FetchedAudio {
            filename: filename.to_string(),
            path,
            cached: false,
        })
    }
}
