use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// ログファイルと標準出力の両方に書き込むライター
///
/// `echo` が false の場合はログファイルのみ。
pub struct TeeWriter {
    file: File,
    echo: bool,
}

impl TeeWriter {
    pub fn open<P: AsRef<Path>>(path: P, echo: bool) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("ログディレクトリの作成に失敗: {:?}", parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("ログファイルを開けません: {:?}", path))?;
        Ok(Self { file, echo })
    }
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        if self.echo {
            // 標準出力への書き込み失敗はログファイルに影響させない
            let _ = io::stdout().write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.echo {
            let _ = io::stdout().flush();
        }
        self.file.flush()
    }
}

/// ロガーを初期化
///
/// 全てのログ行を `log_file` に追記する。`verbose` の場合は標準出力にも表示する。
/// フィルタは `RUST_LOG` が優先され、未設定なら `default_level` を使う。
pub fn init<P: AsRef<Path>>(log_file: P, verbose: bool, default_level: &str) -> Result<()> {
    let writer = TeeWriter::open(log_file, verbose)?;

    Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.level(),
                record.args()
            )
        })
        .filter_module("reqwest", log::LevelFilter::Warn)
        .filter_module("hyper_util", log::LevelFilter::Warn)
        .target(Target::Pipe(Box::new(writer)))
        .try_init()
        .context("ロガーの初期化に失敗")?;

    Ok(())
}
