use crate::config::ColumnConfig;
use crate::types::{RowError, VocabEntry};
use anyhow::{bail, Context, Result};
use std::path::Path;

/// 行ごとの読み込み結果
pub type RowResult = std::result::Result<VocabEntry, RowError>;

/// ヘッダーから解決した列位置
struct ColumnIndex<'a> {
    columns: &'a ColumnConfig,
    word: usize,
    pronunciation: usize,
    standard_chinese: usize,
    english: usize,
}

impl<'a> ColumnIndex<'a> {
    fn resolve(headers: &csv::StringRecord, columns: &'a ColumnConfig) -> Result<Self> {
        let find = |name: &str| -> Result<usize> {
            match headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
            {
                Some(i) => Ok(i),
                None => bail!(
                    "CSVに列 '{}' がありません (ヘッダー: {:?})",
                    name,
                    headers.iter().collect::<Vec<_>>()
                ),
            }
        };

        Ok(Self {
            columns,
            word: find(&columns.word)?,
            pronunciation: find(&columns.pronunciation)?,
            standard_chinese: find(&columns.standard_chinese)?,
            english: find(&columns.english)?,
        })
    }

    fn entry(&self, row: usize, record: &csv::StringRecord) -> RowResult {
        let raw = || record.iter().collect::<Vec<_>>().join(",");

        let required = |index: usize, column: &str| -> std::result::Result<String, RowError> {
            match record.get(index).map(str::trim) {
                Some(value) if !value.is_empty() => Ok(value.to_string()),
                _ => Err(RowError::MissingField {
                    row,
                    column: column.to_string(),
                    raw: raw(),
                }),
            }
        };
        let optional = |index: usize| record.get(index).map(str::trim).unwrap_or_default().to_string();

        Ok(VocabEntry {
            row,
            word: required(self.word, &self.columns.word)?,
            pronunciation: required(self.pronunciation, &self.columns.pronunciation)?,
            standard_chinese: optional(self.standard_chinese),
            english: optional(self.english),
        })
    }
}

/// 語彙リストCSVを読み込む
///
/// ヘッダー行の列名は `columns` で指定する。漢字と発音は必須で、空の行は
/// [`RowError::MissingField`] になる。行のエラーは結果に含めて返し、読み込みは継続する。
///
/// # Errors
///
/// ファイルが開けない、ヘッダーが読めない、指定した列がヘッダーにない場合はエラーを返す。
pub fn load_entries<P: AsRef<Path>>(path: P, columns: &ColumnConfig) -> Result<Vec<RowResult>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("CSVファイルを開けません: {:?}", path))?;

    let headers = reader
        .headers()
        .with_context(|| format!("CSVヘッダーの読み込みに失敗: {:?}", path))?
        .clone();
    let index = ColumnIndex::resolve(&headers, columns)?;

    let rows: Vec<RowResult> = reader
        .records()
        .enumerate()
        .map(|(i, record)| {
            // ヘッダーを1行目として数える
            let row = i + 2;
            match record {
                Ok(record) => index.entry(row, &record),
                Err(e) => Err(RowError::Malformed {
                    row,
                    reason: e.to_string(),
                }),
            }
        })
        .collect();

    log::info!("CSVを読み込みました: {:?} ({}行)", path, rows.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn write_csv_bytes(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_entries() {
        let file = write_csv(
            "客家汉字,Hakka Pronunciation,普通中文,English Definition\n\
             你,ngi2,你,you\n\
             我,ngai2,我,\"I, me\"\n",
        );

        let rows = load_entries(file.path(), &ColumnConfig::default()).unwrap();
        assert_eq!(rows.len(), 2);

        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.row, 2);
        assert_eq!(first.word, "你");
        assert_eq!(first.pronunciation, "ngi2");
        assert_eq!(first.english, "you");

        let second = rows[1].as_ref().unwrap();
        assert_eq!(second.english, "I, me");
    }

    #[test]
    fn test_columns_in_any_order() {
        let file = write_csv(
            "English Definition,普通中文,Hakka Pronunciation,客家汉字,Notes\n\
             you,你,ngi2,你,common\n",
        );

        let rows = load_entries(file.path(), &ColumnConfig::default()).unwrap();
        let entry = rows[0].as_ref().unwrap();
        assert_eq!(entry.word, "你");
        assert_eq!(entry.pronunciation, "ngi2");
        assert_eq!(entry.standard_chinese, "你");
    }

    #[test]
    fn test_missing_field_is_row_error() {
        let file = write_csv(
            "客家汉字,Hakka Pronunciation,普通中文,English Definition\n\
             你,,你,you\n\
             我,ngai2,我,I\n\
             他\n",
        );

        let rows = load_entries(file.path(), &ColumnConfig::default()).unwrap();
        assert_eq!(rows.len(), 3);

        match &rows[0] {
            Err(RowError::MissingField { row, column, .. }) => {
                assert_eq!(*row, 2);
                assert_eq!(column, "Hakka Pronunciation");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(rows[1].is_ok());
        assert!(matches!(rows[2], Err(RowError::MissingField { row: 4, .. })));
    }

    #[test]
    fn test_empty_glosses_allowed() {
        let file = write_csv(
            "客家汉字,Hakka Pronunciation,普通中文,English Definition\n\
             你,ngi2,,\n",
        );

        let rows = load_entries(file.path(), &ColumnConfig::default()).unwrap();
        let entry = rows[0].as_ref().unwrap();
        assert_eq!(entry.standard_chinese, "");
        assert_eq!(entry.english, "");
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let file = write_csv("Word,Reading\n你,ngi2\n");
        let err = load_entries(file.path(), &ColumnConfig::default()).unwrap_err();
        assert!(err.to_string().contains("客家汉字"));
    }

    #[test]
    fn test_unreadable_file_is_fatal() {
        assert!(load_entries("/nonexistent/vocab.csv", &ColumnConfig::default()).is_err());
    }

    #[test]
    fn test_malformed_row_between_valid_rows() {
        let mut content =
            "客家汉字,Hakka Pronunciation,普通中文,English Definition\n你,ngi2,你,you\n"
                .as_bytes()
                .to_vec();
        content.extend_from_slice(b"\xff\xfe,ngai2,x,y\n");
        content.extend_from_slice("我,ngai2,我,I\n".as_bytes());
        let file = write_csv_bytes(&content);

        let rows = load_entries(file.path(), &ColumnConfig::default()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_ref().unwrap().row, 2);
        assert!(matches!(rows[1], Err(RowError::Malformed { row: 3, .. })));
        // 不正な行の後も読み込みを継続する
        let last = rows[2].as_ref().unwrap();
        assert_eq!(last.row, 4);
        assert_eq!(last.word, "我");
    }

    #[test]
    fn test_custom_columns() {
        let file = write_csv("\u{feff}Word,Reading,Mandarin,Meaning\n你,ngi2,你,you\n");
        let columns = ColumnConfig {
            word: "Word".to_string(),
            pronunciation: "Reading".to_string(),
            standard_chinese: "Mandarin".to_string(),
            english: "Meaning".to_string(),
        };

        let rows = load_entries(file.path(), &columns).unwrap();
        assert!(rows[0].is_ok());
    }
}
