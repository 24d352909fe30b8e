use anyhow::{bail, Result};

/// `--test` で処理する行数
pub const TEST_ROW_LIMIT: usize = 5;

pub const USAGE: &str = "\
使い方: hakka-deck [--test] [--verbose] [--no-audio]

  --test       先頭5行だけ処理する
  --verbose    ログを標準出力にも表示する
  --no-audio   音声を取得しない";

/// コマンドライン引数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub test: bool,
    pub verbose: bool,
    pub no_audio: bool,
    pub help: bool,
}

impl CliArgs {
    /// 引数をパース（先頭のプログラム名は含めない）
    ///
    /// # Errors
    ///
    /// 未知の引数があればエラーを返す。
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = CliArgs::default();
        for arg in args {
            match arg.as_ref() {
                "--test" => parsed.test = true,
                "--verbose" => parsed.verbose = true,
                "--no-audio" => parsed.no_audio = true,
                "-h" | "--help" => parsed.help = true,
                other => bail!("不明な引数です: {}\n\n{}", other, USAGE),
            }
        }
        Ok(parsed)
    }

    /// 処理する行数の上限
    pub fn row_limit(&self) -> Option<usize> {
        self.test.then_some(TEST_ROW_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags() {
        let args = CliArgs::parse(Vec::<String>::new()).unwrap();
        assert_eq!(args, CliArgs::default());
        assert_eq!(args.row_limit(), None);
    }

    #[test]
    fn test_all_flags() {
        let args = CliArgs::parse(["--test", "--verbose", "--no-audio"]).unwrap();
        assert!(args.test);
        assert!(args.verbose);
        assert!(args.no_audio);
        assert_eq!(args.row_limit(), Some(5));
    }

    #[test]
    fn test_unknown_flag() {
        let err = CliArgs::parse(["--limit=10"]).unwrap_err();
        assert!(err.to_string().contains("--limit=10"));
    }

    #[test]
    fn test_help() {
        assert!(CliArgs::parse(["-h"]).unwrap().help);
    }
}
