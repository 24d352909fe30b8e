//! Ankiパッケージ（.apkg）の書き出し
//!
//! .apkg は次のエントリを持つzipファイル:
//!
//! ```text
//! collection.anki2   SQLiteのコレクション（スキーマ v11）
//! media              {"0": "你.mp3", ...} のJSON
//! 0, 1, ...          音声ファイル本体
//! ```

use crate::annotate::strip_html;
use crate::config::DeckConfig;
use crate::types::CardRecord;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde_json::json;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const FIELD_SEPARATOR: &str = "\x1f";

const FIELD_NAMES: [&str; 5] = ["Character", "Pronunciation", "StandardChinese", "English", "Audio"];

const FRONT_TEMPLATE: &str = r#"<div style="font-size: 50px; text-align: center;">{{Character}}</div>"#;

const BACK_TEMPLATE: &str = r#"<div style="font-size: 50px; text-align: center;">{{Character}}</div>
<div style="font-size: 40px; text-align: center; margin-top: 20px;">
    <strong>Hakka Pronunciation:</strong> {{Pronunciation}}
</div>
<div style="font-size: 30px; text-align: center; margin-top: 15px;">
    <strong>普通中文:</strong> {{StandardChinese}}
</div>
<div style="font-size: 30px; text-align: center; margin-top: 15px;">
    <strong>Eng:</strong> {{English}}
</div>
<div style="text-align: center;">
    {{Audio}}
</div>"#;

const CARD_CSS: &str = ".card {\n font-family: arial;\n font-size: 20px;\n text-align: center;\n color: black;\n background-color: white;\n}\n";

const SCHEMA: &str = r#"
CREATE TABLE col (
    id              integer primary key,
    crt             integer not null,
    mod             integer not null,
    scm             integer not null,
    ver             integer not null,
    dty             integer not null,
    usn             integer not null,
    ls              integer not null,
    conf            text not null,
    models          text not null,
    decks           text not null,
    dconf           text not null,
    tags            text not null
);
CREATE TABLE notes (
    id              integer primary key,
    guid            text not null,
    mid             integer not null,
    mod             integer not null,
    usn             integer not null,
    tags            text not null,
    flds            text not null,
    sfld            integer not null,
    csum            integer not null,
    flags           integer not null,
    data            text not null
);
CREATE TABLE cards (
    id              integer primary key,
    nid             integer not null,
    did             integer not null,
    ord             integer not null,
    mod             integer not null,
    usn             integer not null,
    type            integer not null,
    queue           integer not null,
    due             integer not null,
    ivl             integer not null,
    factor          integer not null,
    reps            integer not null,
    lapses          integer not null,
    left            integer not null,
    odue            integer not null,
    odid            integer not null,
    flags           integer not null,
    data            text not null
);
CREATE TABLE revlog (
    id              integer primary key,
    cid             integer not null,
    usn             integer not null,
    ease            integer not null,
    ivl             integer not null,
    lastIvl         integer not null,
    factor          integer not null,
    time            integer not null,
    type            integer not null
);
CREATE TABLE graves (
    usn             integer not null,
    oid             integer not null,
    type            integer not null
);
CREATE INDEX ix_notes_usn on notes (usn);
CREATE INDEX ix_cards_usn on cards (usn);
CREATE INDEX ix_revlog_usn on revlog (usn);
CREATE INDEX ix_cards_nid on cards (nid);
CREATE INDEX ix_cards_sched on cards (did, queue, due);
CREATE INDEX ix_revlog_cid on revlog (cid);
CREATE INDEX ix_notes_csum on notes (csum);
"#;

const BASE91_TABLE: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&()*+,-./:;<=>?@[]^_`{|}~";

/// パッケージ書き出し結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageStats {
    pub notes: usize,
    pub media: usize,
}

/// Ankiパッケージライター
pub struct ApkgWriter<'a> {
    deck: &'a DeckConfig,
}

impl<'a> ApkgWriter<'a> {
    pub fn new(deck: &'a DeckConfig) -> Self {
        Self { deck }
    }

    /// カードと音声ファイルを1つの .apkg に書き出す
    ///
    /// 一時ファイルに組み立ててから置き換えるため、失敗時に中途半端なファイルは残らない。
    pub fn write<P: AsRef<Path>>(&self, output: P, cards: &[CardRecord]) -> Result<PackageStats> {
        let output = output.as_ref();
        let work_dir = TempDir::new().context("作業ディレクトリの作成に失敗")?;
        let collection_path = work_dir.path().join("collection.anki2");

        self.write_collection(&collection_path, cards)?;
        let media = collect_media(cards);

        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("出力ディレクトリの作成に失敗: {:?}", parent))?;

        let mut temp = NamedTempFile::new_in(parent)
            .with_context(|| format!("一時ファイルの作成に失敗: {:?}", parent))?;
        let media_count = write_archive(temp.as_file_mut(), &collection_path, &media)?;
        temp.persist(output)
            .with_context(|| format!("デッキファイルの書き込みに失敗: {:?}", output))?;

        Ok(PackageStats {
            notes: cards.len(),
            media: media_count,
        })
    }

    fn write_collection(&self, path: &Path, cards: &[CardRecord]) -> Result<()> {
        let mut conn = Connection::open(path)
            .with_context(|| format!("コレクションの作成に失敗: {:?}", path))?;
        conn.execute_batch(SCHEMA)
            .context("コレクションのスキーマ作成に失敗")?;

        let now = chrono::Utc::now();
        let now_secs = now.timestamp();
        let now_ms = now.timestamp_millis();

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO col VALUES(null, ?1, ?2, ?3, 11, 0, 0, 0, ?4, ?5, ?6, ?7, '{}')",
            params![
                now_secs - now_secs % 86_400,
                now_ms,
                now_ms,
                self.collection_conf().to_string(),
                self.models_json(now_secs).to_string(),
                self.decks_json(now_secs).to_string(),
                default_deck_conf().to_string(),
            ],
        )
        .context("コレクション情報の書き込みに失敗")?;

        for (i, card) in cards.iter().enumerate() {
            let note_id = now_ms + i as i64;
            let fields = card.fields();
            let sort_field = strip_html(fields[0]);

            tx.execute(
                "INSERT INTO notes VALUES(?1, ?2, ?3, ?4, -1, '', ?5, ?6, ?7, 0, '')",
                params![
                    note_id,
                    note_guid(&fields),
                    self.deck.model_id,
                    now_secs,
                    fields.join(FIELD_SEPARATOR),
                    sort_field,
                    field_checksum(&sort_field),
                ],
            )
            .with_context(|| format!("{}行目のノート書き込みに失敗", card.row))?;

            tx.execute(
                "INSERT INTO cards VALUES(?1, ?2, ?3, 0, ?4, -1, 0, 0, ?5, 0, 0, 0, 0, 0, 0, 0, 0, '')",
                params![note_id, note_id, self.deck.deck_id, now_secs, i as i64 + 1],
            )
            .with_context(|| format!("{}行目のカード書き込みに失敗", card.row))?;
        }

        tx.commit().context("コレクションのコミットに失敗")?;
        Ok(())
    }

    fn collection_conf(&self) -> serde_json::Value {
        json!({
            "activeDecks": [1],
            "addToCur": true,
            "collapseTime": 1200,
            "curDeck": 1,
            "curModel": self.deck.model_id.to_string(),
            "dueCounts": true,
            "estTimes": true,
            "newBury": true,
            "newSpread": 0,
            "nextPos": 1,
            "sortBackwards": false,
            "sortType": "noteFld",
            "timeLim": 0
        })
    }

    fn models_json(&self, now_secs: i64) -> serde_json::Value {
        let fields: Vec<serde_json::Value> = FIELD_NAMES
            .iter()
            .enumerate()
            .map(|(ord, name)| {
                json!({
                    "name": name,
                    "ord": ord,
                    "font": "Arial",
                    "size": 20,
                    "media": [],
                    "rtl": false,
                    "sticky": false
                })
            })
            .collect();

        let model = json!({
            "id": self.deck.model_id,
            "name": self.deck.model_name,
            "type": 0,
            "mod": now_secs,
            "usn": -1,
            "sortf": 0,
            "did": self.deck.deck_id,
            "tmpls": [{
                "name": "Card 1",
                "ord": 0,
                "qfmt": FRONT_TEMPLATE,
                "afmt": BACK_TEMPLATE,
                "bqfmt": "",
                "bafmt": "",
                "did": null
            }],
            "flds": fields,
            "css": CARD_CSS,
            "latexPre": "\\documentclass[12pt]{article}\n\\special{papersize=3in,5in}\n\\usepackage[utf8]{inputenc}\n\\usepackage{amssymb,amsmath}\n\\pagestyle{empty}\n\\setlength{\\parindent}{0in}\n\\begin{document}\n",
            "latexPost": "\\end{document}",
            "tags": [],
            "vers": [],
            "req": [[0, "all", [0]]]
        });

        let mut models = serde_json::Map::new();
        models.insert(self.deck.model_id.to_string(), model);
        serde_json::Value::Object(models)
    }

    fn decks_json(&self, now_secs: i64) -> serde_json::Value {
        let deck = |id: i64, name: &str| {
            json!({
                "id": id,
                "name": name,
                "desc": "",
                "mod": now_secs,
                "usn": -1,
                "conf": 1,
                "dyn": 0,
                "collapsed": false,
                "extendNew": 10,
                "extendRev": 50,
                "newToday": [0, 0],
                "revToday": [0, 0],
                "lrnToday": [0, 0],
                "timeToday": [0, 0]
            })
        };

        let mut decks = serde_json::Map::new();
        decks.insert("1".to_string(), deck(1, "Default"));
        decks.insert(self.deck.deck_id.to_string(), deck(self.deck.deck_id, &self.deck.deck_name));
        serde_json::Value::Object(decks)
    }
}

fn default_deck_conf() -> serde_json::Value {
    json!({
        "1": {
            "id": 1,
            "name": "Default",
            "mod": 0,
            "usn": 0,
            "maxTaken": 60,
            "autoplay": true,
            "replayq": true,
            "timer": 0,
            "new": {
                "bury": true,
                "delays": [1, 10],
                "initialFactor": 2500,
                "ints": [1, 4, 7],
                "order": 1,
                "perDay": 20,
                "separate": true
            },
            "rev": {
                "bury": true,
                "ease4": 1.3,
                "fuzz": 0.05,
                "ivlFct": 1,
                "maxIvl": 36500,
                "minSpace": 1,
                "perDay": 100
            },
            "lapse": {
                "delays": [10],
                "leechAction": 0,
                "leechFails": 8,
                "minInt": 1,
                "mult": 0
            }
        }
    })
}

/// 同梱する音声ファイル（ファイル名 → パス、重複は除く）
fn collect_media(cards: &[CardRecord]) -> BTreeMap<String, PathBuf> {
    cards
        .iter()
        .filter_map(|card| {
            let path = card.media_file.as_ref()?;
            let name = path.file_name()?.to_string_lossy().into_owned();
            Some((name, path.clone()))
        })
        .collect()
}

fn write_archive(
    file: &mut File,
    collection_path: &Path,
    media: &BTreeMap<String, PathBuf>,
) -> Result<usize> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(file);

    zip.start_file("collection.anki2", options)?;
    let mut collection = File::open(collection_path)
        .with_context(|| format!("コレクションを開けません: {:?}", collection_path))?;
    io::copy(&mut collection, &mut zip).context("コレクションの書き込みに失敗")?;

    let mut media_map = BTreeMap::new();
    for (name, path) in media {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("音声ファイルを読み込めないためスキップします: {:?}: {}", path, e);
                continue;
            }
        };
        let index = media_map.len().to_string();
        zip.start_file(index.as_str(), options)?;
        zip.write_all(&data)
            .with_context(|| format!("音声ファイルの書き込みに失敗: {:?}", path))?;
        media_map.insert(index, name.clone());
    }

    zip.start_file("media", options)?;
    zip.write_all(serde_json::to_string(&media_map)?.as_bytes())?;
    zip.finish().context("デッキファイルのファイナライズに失敗")?;

    Ok(media_map.len())
}

/// フィールド内容から安定したノートGUIDを生成（base91）
fn note_guid(fields: &[&str]) -> String {
    let digest = Sha1::digest(fields.join(FIELD_SEPARATOR).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let mut value = u64::from_be_bytes(bytes);

    let mut encoded = Vec::new();
    loop {
        encoded.push(BASE91_TABLE[(value % 91) as usize]);
        value /= 91;
        if value == 0 {
            break;
        }
    }
    encoded.reverse();
    String::from_utf8_lossy(&encoded).into_owned()
}

/// ソートフィールドのチェックサム（SHA-1 先頭8桁）
fn field_checksum(sort_field: &str) -> i64 {
    let digest = Sha1::digest(sort_field.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn card(row: usize, word: &str, media_file: Option<PathBuf>) -> CardRecord {
        let audio = media_file
            .as_ref()
            .map(|_| format!("[sound:{}.mp3]", word))
            .unwrap_or_default();
        CardRecord {
            row,
            character: format!(r#"<span style="color: blue;">{}</span>"#, word),
            pronunciation: "ngi\u{0304}".to_string(),
            standard_chinese: word.to_string(),
            english: "you".to_string(),
            audio,
            media_file,
            pronunciation_source: "ngi2".to_string(),
            audio_filename: format!("{}.mp3", word),
        }
    }

    fn read_entry(archive: &mut zip::ZipArchive<File>, name: &str) -> Vec<u8> {
        let mut entry = archive.by_name(name).unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        data
    }

    #[test]
    fn test_write_package() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let audio_path = temp_dir.path().join("你.mp3");
        fs::write(&audio_path, b"ID3-audio")?;

        let cards = vec![
            card(2, "你", Some(audio_path.clone())),
            card(3, "我", None),
        ];
        let deck = DeckConfig::default();
        let output = temp_dir.path().join("out").join("deck.apkg");

        let stats = ApkgWriter::new(&deck).write(&output, &cards)?;
        assert_eq!(stats, PackageStats { notes: 2, media: 1 });

        let mut archive = zip::ZipArchive::new(File::open(&output)?)?;
        let media: BTreeMap<String, String> =
            serde_json::from_slice(&read_entry(&mut archive, "media"))?;
        assert_eq!(media.get("0").map(String::as_str), Some("你.mp3"));
        assert_eq!(read_entry(&mut archive, "0"), b"ID3-audio");

        let collection_path = temp_dir.path().join("collection.anki2");
        fs::write(&collection_path, read_entry(&mut archive, "collection.anki2"))?;
        let conn = Connection::open(&collection_path)?;

        let note_count: i64 = conn.query_row("SELECT count(*) FROM notes", [], |r| r.get(0))?;
        let card_count: i64 = conn.query_row(
            "SELECT count(*) FROM cards WHERE did = ?1",
            [deck.deck_id],
            |r| r.get(0),
        )?;
        assert_eq!(note_count, 2);
        assert_eq!(card_count, 2);

        let (flds, sfld, mid): (String, String, i64) = conn.query_row(
            "SELECT flds, sfld, mid FROM notes ORDER BY id LIMIT 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;
        assert_eq!(flds, cards[0].fields().join("\x1f"));
        assert_eq!(sfld, "你");
        assert_eq!(mid, deck.model_id);

        let decks: String = conn.query_row("SELECT decks FROM col", [], |r| r.get(0))?;
        let decks: serde_json::Value = serde_json::from_str(&decks)?;
        assert_eq!(
            decks[deck.deck_id.to_string()]["name"],
            "Fui Yong Hakka Language Deck with Diacritics & Audio"
        );

        let models: String = conn.query_row("SELECT models FROM col", [], |r| r.get(0))?;
        let models: serde_json::Value = serde_json::from_str(&models)?;
        let model = &models[deck.model_id.to_string()];
        assert_eq!(model["flds"].as_array().map(Vec::len), Some(5));
        assert_eq!(model["flds"][4]["name"], "Audio");
        Ok(())
    }

    #[test]
    fn test_missing_media_is_skipped() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cards = vec![card(2, "你", Some(temp_dir.path().join("missing.mp3")))];
        let output = temp_dir.path().join("deck.apkg");

        let stats = ApkgWriter::new(&DeckConfig::default()).write(&output, &cards)?;
        assert_eq!(stats.media, 0);

        let mut archive = zip::ZipArchive::new(File::open(&output)?)?;
        assert_eq!(read_entry(&mut archive, "media"), b"{}");
        Ok(())
    }

    #[test]
    fn test_duplicate_media_packed_once() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let audio_path = temp_dir.path().join("你.mp3");
        fs::write(&audio_path, b"audio")?;
        let cards = vec![
            card(2, "你", Some(audio_path.clone())),
            card(3, "你", Some(audio_path)),
        ];

        let stats =
            ApkgWriter::new(&DeckConfig::default()).write(temp_dir.path().join("deck.apkg"), &cards)?;
        assert_eq!(stats, PackageStats { notes: 2, media: 1 });
        Ok(())
    }

    #[test]
    fn test_note_guid_is_stable() {
        let a = note_guid(&["你", "ngi", "你", "you", ""]);
        let b = note_guid(&["你", "ngi", "你", "you", ""]);
        let c = note_guid(&["我", "ngai", "我", "I", ""]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.bytes().all(|byte| BASE91_TABLE.contains(&byte)));
    }

    #[test]
    fn test_field_checksum() {
        let digest = Sha1::digest("你".as_bytes());
        let hex: String = digest[..4].iter().map(|b| format!("{:02x}", b)).collect();
        assert_eq!(field_checksum("你"), i64::from_str_radix(&hex, 16).unwrap());
    }
}
