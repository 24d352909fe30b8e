//! 声調番号（1〜6）のルックアップテーブル
//!
//! 香港客家語（恵陽片）の声調番号を、表示色と結合ダイアクリティカルマークに対応付ける。
//! 色の割り当ては既存デッキとの互換性のため固定。
//!
//! | 声調 | 調類   | 色     | 記号             |
//! |------|--------|--------|------------------|
//! | 1    | 陰平聲 | red    | U+0301 acute     |
//! | 2    | 陽平聲 | blue   | U+0304 macron    |
//! | 3    | 上聲   | green  | U+030C caron     |
//! | 4    | 去聲   | purple | U+0300 grave     |
//! | 5    | 陰入聲 | orange | U+030C caron     |
//! | 6    | 陽入聲 | yellow | U+0300 grave     |

/// 声調（1〜6）
///
/// # Examples
///
/// ```
/// # use hakka_deck::tone::Tone;
/// let tone = Tone::from_digit('2').unwrap();
/// assert_eq!(tone.color(), "blue");
/// assert_eq!(tone.diacritic(), '\u{0304}');
/// assert!(Tone::from_digit('7').is_none());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tone(u8);

const TONE_COLORS: [&str; 6] = ["red", "blue", "green", "purple", "orange", "yellow"];

const TONE_DIACRITICS: [char; 6] = [
    '\u{0301}', // acute
    '\u{0304}', // macron
    '\u{030C}', // caron
    '\u{0300}', // grave
    '\u{030C}', // caron（入声）
    '\u{0300}', // grave（入声）
];

impl Tone {
    /// 声調番号の文字 `'1'`〜`'6'` から変換する。それ以外は `None`
    pub fn from_digit(c: char) -> Option<Self> {
        match c {
            '1'..='6' => Some(Self(c as u8 - b'0')),
            _ => None,
        }
    }

    /// 表示色（CSSの色名）
    pub fn color(self) -> &'static str {
        TONE_COLORS[(self.0 - 1) as usize]
    }

    /// 母音の直後に挿入する結合ダイアクリティカルマーク
    pub fn diacritic(self) -> char {
        TONE_DIACRITICS[(self.0 - 1) as usize]
    }
}

/// 声調番号の文字から表示色を取得
///
/// `'1'`〜`'6'` 以外（`'0'`, `'7'`〜`'9'`, 数字以外）は `None`。
pub fn tone_color(c: char) -> Option<&'static str> {
    Tone::from_digit(c).map(Tone::color)
}

/// テキストを声調色の `<span>` で囲む
///
/// 声調番号が認識できない場合はテキストをそのまま返す。
pub fn apply_tone_color(text: &str, digit: char) -> String {
    match tone_color(digit) {
        Some(color) => wrap_color(text, color),
        None => text.to_string(),
    }
}

pub(crate) fn wrap_color(text: &str, color: &str) -> String {
    format!(r#"<span style="color: {};">{}</span>"#, color, text)
}
