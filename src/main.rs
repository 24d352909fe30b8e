use anyhow::Result;
use hakka_deck::cli::{CliArgs, USAGE};
use hakka_deck::config::{Config, DEFAULT_CONFIG_PATH};
use hakka_deck::deck_builder::{BuildOptions, DeckBuilder};
use hakka_deck::tts_client::{AudioSource, HakkaTtsClient};
use hakka_deck::{logging, vocab_source};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // コマンドライン引数をパース
    let args = CliArgs::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }

    // 設定を読み込み、ロガーを初期化
    let loaded = Config::load(DEFAULT_CONFIG_PATH)?;
    let config_found = loaded.is_some();
    let config = loaded.unwrap_or_default();
    logging::init(&config.paths.log_file, args.verbose, &config.output.log_level)?;

    log::info!("hakka-deck を起動します");
    if !config_found {
        log::warn!(
            "設定ファイルが見つかりません。デフォルト設定を使用します: {}",
            DEFAULT_CONFIG_PATH
        );
    }
    log::debug!("設定: {:?}", config);

    if let Err(e) = run(&config, &args).await {
        log::error!("処理に失敗しました: {:#}", e);
        return Err(e);
    }

    Ok(())
}

async fn run(config: &Config, args: &CliArgs) -> Result<()> {
    log::info!("CSVファイルを読み込んでいます...");
    let rows = vocab_source::load_entries(&config.paths.csv_path, &config.columns)?;

    let audio: Option<Arc<dyn AudioSource>> = if args.no_audio {
        None
    } else {
        Some(Arc::new(HakkaTtsClient::new(
            &config.tts,
            &config.paths.audio_dir,
        )?))
    };

    let summary = DeckBuilder::new(config, BuildOptions::from(args), audio)
        .run(rows)
        .await?;

    // 集計をJSON形式で出力
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
