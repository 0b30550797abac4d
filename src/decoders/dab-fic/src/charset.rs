// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Label character sets.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Charset {
    /// Complete EBU Latin based repertoire.
    EbuLatin,
    Ucs2,
    Utf8,
}

impl Charset {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::EbuLatin),
            6 => Some(Self::Ucs2),
            15 => Some(Self::Utf8),
            _ => None,
        }
    }
}

/// Upper half (0x80..=0xFF) of the EBU Latin repertoire.
const EBU_HIGH: [char; 128] = [
    'á', 'à', 'é', 'è', 'í', 'ì', 'ó', 'ò', 'ú', 'ù', 'Ñ', 'Ç', 'Ş', 'ß', '¡', 'Ĳ', //
    'â', 'ä', 'ê', 'ë', 'î', 'ï', 'ô', 'ö', 'û', 'ü', 'ñ', 'ç', 'ş', 'ğ', 'ı', 'ĳ', //
    'ª', 'α', '©', '‰', 'Ǧ', 'ě', 'ň', 'ő', 'π', '€', '£', '$', '←', '↑', '→', '↓', //
    'º', '¹', '²', '³', '±', 'İ', 'ń', 'ű', 'µ', '¿', '÷', '°', '¼', '½', '¾', '§', //
    'Á', 'À', 'É', 'È', 'Í', 'Ì', 'Ó', 'Ò', 'Ú', 'Ù', 'Ř', 'Č', 'Š', 'Ž', 'Ð', 'Ŀ', //
    'Â', 'Ä', 'Ê', 'Ë', 'Î', 'Ï', 'Ô', 'Ö', 'Û', 'Ü', 'ř', 'č', 'š', 'ž', 'đ', 'ŀ', //
    'Ã', 'Å', 'Æ', 'Œ', 'ŷ', 'Ý', 'Õ', 'Ø', 'Þ', 'Ŋ', 'Ŕ', 'Ć', 'Ś', 'Ź', 'Ŧ', 'ð', //
    'ã', 'å', 'æ', 'œ', 'ŵ', 'ý', 'õ', 'ø', 'þ', 'ŋ', 'ŕ', 'ć', 'ś', 'ź', 'ŧ', ' ', //
];

fn ebu_char(byte: u8) -> char {
    match byte {
        0x24 => '¤',
        0x5e => '―',
        0x60 => '‖',
        0x7e => '¯',
        0x20..=0x7f => byte as char,
        0x80..=0xff => EBU_HIGH[(byte - 0x80) as usize],
        _ => ' ',
    }
}

/// Characters of a label field, trailing padding included.
pub fn label_chars(bytes: &[u8], charset: Charset) -> Vec<char> {
    match charset {
        Charset::EbuLatin => bytes.iter().map(|&b| ebu_char(b)).collect(),
        Charset::Ucs2 => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            char::decode_utf16(units)
                .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        Charset::Utf8 => String::from_utf8_lossy(bytes).chars().collect(),
    }
}

/// Decode a 16-byte label, stripping NULs and trailing blanks.
pub fn decode_label(bytes: &[u8], charset: Charset) -> String {
    let text: String = label_chars(bytes, charset)
        .into_iter()
        .filter(|&c| c != '\0')
        .collect();
    text.trim_end().to_string()
}

/// Short form of a label: the characters whose bit is set in `flags`
/// (bit 15 selects the first character).
pub fn short_label(bytes: &[u8], charset: Charset, flags: u16) -> String {
    let text: String = label_chars(bytes, charset)
        .into_iter()
        .take(16)
        .enumerate()
        .filter(|(i, _)| flags & (0x8000 >> i) != 0)
        .map(|(_, c)| c)
        .collect();
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ebu_latin_label_is_trimmed() {
        assert_eq!(decode_label(b"Radio Eins      ", Charset::EbuLatin), "Radio Eins");
        assert_eq!(decode_label(&[0x4b, 0x99, 0x6c, 0x6e], Charset::EbuLatin), "Kün");
        assert_eq!(decode_label(&[0x24, 0x41], Charset::EbuLatin), "¤A");
    }

    #[test]
    fn ucs2_and_utf8_labels() {
        let ucs2 = [0x00, 0x5a, 0x00, 0xfc, 0x00, 0x20, 0x00, 0x20];
        assert_eq!(decode_label(&ucs2, Charset::Ucs2), "Zü");
        assert_eq!(decode_label("Žilina  ".as_bytes(), Charset::Utf8), "Žilina");
    }

    #[test]
    fn short_label_follows_flag_bits() {
        let label = b"Deutschlandfunk ";
        assert_eq!(short_label(label, Charset::EbuLatin, 0xf000), "Deut");
        assert_eq!(short_label(label, Charset::EbuLatin, 0x8000 | 0x0010), "Df");
    }

    #[test]
    fn charset_codes() {
        assert_eq!(Charset::from_code(0), Some(Charset::EbuLatin));
        assert_eq!(Charset::from_code(15), Some(Charset::Utf8));
        assert_eq!(Charset::from_code(3), None);
    }
}
