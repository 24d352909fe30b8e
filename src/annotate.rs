//! 声調アノテーションエンジン
//!
//! 声調番号付きのローマ字表記（例: `ngai2`）から、
//!
//! - 漢字1文字ずつの声調色付け（[`colorize_characters`]）
//! - ダイアクリティカルマーク付き・色付きの発音表記（[`diacritize_pronunciation`]）
//!
//! を生成する。どちらも入力だけに依存する純粋関数で、複数スレッドから同時に呼び出してよい。

use crate::tone::{self, Tone};
use regex_lite::{Captures, Regex};
use std::sync::OnceLock;

const VOWELS: &[u8] = b"aeiouAEIOU";

fn syllable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([a-zA-Z]+)([1-6])").expect("音節パターンが不正"))
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<.*?>").expect("タグパターンが不正"))
}

/// 単語の各文字を、発音中の声調番号に従って色付けする
///
/// 発音文字列から `1`〜`6` の数字を左から順に取り出し、単語の i 文字目に i 番目の声調色を付ける。
/// 声調番号が足りない文字は色なし、余った声調番号は無視する。
///
/// # Examples
///
/// ```
/// # use hakka_deck::annotate::colorize_characters;
/// assert_eq!(
///     colorize_characters("你", "ngi2"),
///     r#"<span style="color: blue;">你</span>"#
/// );
/// assert_eq!(colorize_characters("你好", ""), "你好");
/// ```
pub fn colorize_characters(word: &str, pronunciation: &str) -> String {
    let tones: Vec<Tone> = pronunciation.chars().filter_map(Tone::from_digit).collect();

    let mut result = String::with_capacity(word.len() * 2);
    for (i, ch) in word.chars().enumerate() {
        let mut buf = [0u8; 4];
        let ch = ch.encode_utf8(&mut buf);
        match tones.get(i) {
            Some(tone) => result.push_str(&tone::wrap_color(ch, tone.color())),
            None => result.push_str(ch),
        }
    }
    result
}

/// 声調番号付きの音節をダイアクリティカルマーク付き・色付きの音節に書き換える
///
/// 「ASCII英字の連続 + 声調番号 `1`〜`6`」にマッチする部分だけを書き換え、それ以外
/// （区切り文字、声調番号のない音節、`0`/`7`〜`9` が続く音節）はそのまま残す。
///
/// マークの位置:
/// - 母音が2つ以上: 後ろから2番目の母音の直後
/// - 母音が1つ: その母音の直後
/// - 母音なし（`ng5` など）: マークなし。声調番号は除去し、色付けは行う
///
/// # Examples
///
/// ```
/// # use hakka_deck::annotate::diacritize_pronunciation;
/// assert_eq!(
///     diacritize_pronunciation("ko4"),
///     "<span style=\"color: purple;\">ko\u{0300}</span>"
/// );
/// ```
pub fn diacritize_pronunciation(pronunciation: &str) -> String {
    syllable_pattern()
        .replace_all(pronunciation, |caps: &Captures| {
            let syllable = &caps[1];
            // パターン上、2番目のグループは必ず 1〜6 の1文字
            let Some(tone) = caps[2].chars().next().and_then(Tone::from_digit) else {
                return caps[0].to_string();
            };
            tone::wrap_color(&place_diacritic(syllable, tone), tone.color())
        })
        .into_owned()
}

/// 音節にマークを挿入（音節はASCII英字のみ）
fn place_diacritic(syllable: &str, tone: Tone) -> String {
    let vowels: Vec<usize> = syllable
        .bytes()
        .enumerate()
        .filter(|(_, b)| VOWELS.contains(b))
        .map(|(i, _)| i)
        .collect();

    let target = match vowels.len() {
        0 => return syllable.to_string(),
        1 => vowels[0],
        n => vowels[n - 2],
    };

    let mut marked = String::with_capacity(syllable.len() + 2);
    marked.push_str(&syllable[..=target]);
    marked.push(tone.diacritic());
    marked.push_str(&syllable[target + 1..]);
    marked
}

/// HTMLタグを除去する（ログ出力用）
pub fn strip_html(text: &str) -> String {
    tag_pattern().replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(color: &str, text: &str) -> String {
        format!(r#"<span style="color: {};">{}</span>"#, color, text)
    }

    #[test]
    fn test_colorize_single_character() {
        assert_eq!(colorize_characters("你", "ngi2"), span("blue", "你"));
    }

    #[test]
    fn test_colorize_each_character_individually() {
        let result = colorize_characters("客家", "hak5 ka1");
        assert_eq!(result, format!("{}{}", span("orange", "客"), span("red", "家")));
    }

    #[test]
    fn test_colorize_fewer_tones_than_characters() {
        let result = colorize_characters("客家話", "hak5 ka1 va");
        assert_eq!(
            result,
            format!("{}{}話", span("orange", "客"), span("red", "家"))
        );
    }

    #[test]
    fn test_colorize_extra_tones_ignored() {
        assert_eq!(colorize_characters("我", "ngai2 ngai2"), span("blue", "我"));
    }

    #[test]
    fn test_colorize_without_digits() {
        assert_eq!(colorize_characters("你好", ""), "你好");
        assert_eq!(colorize_characters("你好", "ngi ho"), "你好");
    }

    #[test]
    fn test_colorize_skips_invalid_digits() {
        // 7〜9 と 0 は声調番号として数えない
        let result = colorize_characters("一二", "a7 b0 c3 d4");
        assert_eq!(result, format!("{}{}", span("green", "一"), span("purple", "二")));
    }

    #[test]
    fn test_colorize_empty_word() {
        assert_eq!(colorize_characters("", "ngai2"), "");
    }

    #[test]
    fn test_colorize_preserves_character_count() {
        let cases = [
            ("你", "ngi2"),
            ("客家話", "hak5 ka1 va4"),
            ("天光日", "tien1"),
            ("食飯", ""),
            ("一", "it5 yi6 sam1"),
        ];
        for (word, pron) in cases {
            let plain = strip_html(&colorize_characters(word, pron));
            assert_eq!(plain.chars().count(), word.chars().count(), "{}", word);
            assert_eq!(plain, word);
        }
    }

    #[test]
    fn test_diacritize_two_vowels() {
        assert_eq!(
            diacritize_pronunciation("ngai2"),
            span("blue", "nga\u{0304}i")
        );
    }

    #[test]
    fn test_diacritize_single_vowel() {
        assert_eq!(diacritize_pronunciation("ko4"), span("purple", "ko\u{0300}"));
    }

    #[test]
    fn test_diacritize_no_vowel() {
        assert_eq!(diacritize_pronunciation("ng5"), span("orange", "ng"));
        assert_eq!(diacritize_pronunciation("m2"), span("blue", "m"));
    }

    #[test]
    fn test_diacritize_three_vowels_uses_second_to_last() {
        // i, e, u → e の直後
        assert_eq!(
            diacritize_pronunciation("kieu3"),
            span("green", "kie\u{030C}u")
        );
    }

    #[test]
    fn test_diacritize_uppercase_vowels() {
        assert_eq!(
            diacritize_pronunciation("NGAI1"),
            span("red", "NGA\u{0301}I")
        );
    }

    #[test]
    fn test_diacritize_end_to_end_with_colorizer() {
        let word = colorize_characters("你", "ngi2");
        let pron = diacritize_pronunciation("ngi2");
        assert_eq!(word, span("blue", "你"));
        assert_eq!(pron, span("blue", "ngi\u{0304}"));
    }

    #[test]
    fn test_diacritize_multiple_syllables_keep_separators() {
        assert_eq!(
            diacritize_pronunciation("hak5 ka1-va4"),
            format!(
                "{} {}-{}",
                span("orange", "ha\u{030C}k"),
                span("red", "ka\u{0301}"),
                span("purple", "va\u{0300}")
            )
        );
    }

    #[test]
    fn test_diacritize_unmatched_tokens_pass_through() {
        assert_eq!(diacritize_pronunciation("abc7, def0!"), "abc7, def0!");
        assert_eq!(diacritize_pronunciation("ngai"), "ngai");
        assert_eq!(diacritize_pronunciation(""), "");
        assert_eq!(diacritize_pronunciation("(?) 123"), "(?) 123");
    }

    #[test]
    fn test_diacritize_mixed_valid_and_invalid() {
        assert_eq!(
            diacritize_pronunciation("sip8 ngai2."),
            format!("sip8 {}.", span("blue", "nga\u{0304}i"))
        );
    }

    #[test]
    fn test_diacritize_consumes_only_one_digit() {
        assert_eq!(
            diacritize_pronunciation("ko42"),
            format!("{}2", span("purple", "ko\u{0300}"))
        );
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html(&span("red", "ka\u{0301}")), "ka\u{0301}");
        assert_eq!(strip_html("plain"), "plain");
    }
}
