//! HTML character reference decoding, including the legacy forms browsers
//! accept without a trailing semicolon (`&amp chips`, `&#39s`).

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

static CHAR_REF_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#([0-9]+);?|#[xX]([0-9a-fA-F]+);?|([^\t\n\x0C <&#;]{1,32};?))")
        .expect("character reference pattern must compile")
});

/// Named references valid without a semicolon, U+00A0 through U+00FF in
/// code point order.
const LATIN1_NAMES: [&str; 96] = [
    "nbsp", "iexcl", "cent", "pound", "curren", "yen", "brvbar", "sect",
    "uml", "copy", "ordf", "laquo", "not", "shy", "reg", "macr",
    "deg", "plusmn", "sup2", "sup3", "acute", "micro", "para", "middot",
    "cedil", "sup1", "ordm", "raquo", "frac14", "frac12", "frac34", "iquest",
    "Agrave", "Aacute", "Acirc", "Atilde", "Auml", "Aring", "AElig", "Ccedil",
    "Egrave", "Eacute", "Ecirc", "Euml", "Igrave", "Iacute", "Icirc", "Iuml",
    "ETH", "Ntilde", "Ograve", "Oacute", "Ocirc", "Otilde", "Ouml", "times",
    "Oslash", "Ugrave", "Uacute", "Ucirc", "Uuml", "Yacute", "THORN", "szlig",
    "agrave", "aacute", "acirc", "atilde", "auml", "aring", "aelig", "ccedil",
    "egrave", "eacute", "ecirc", "euml", "igrave", "iacute", "icirc", "iuml",
    "eth", "ntilde", "ograve", "oacute", "ocirc", "otilde", "ouml", "divide",
    "oslash", "ugrave", "uacute", "ucirc", "uuml", "yacute", "thorn", "yuml",
];

const ASCII_LEGACY: [(&str, char); 10] = [
    ("amp", '&'), ("AMP", '&'),
    ("lt", '<'), ("LT", '<'),
    ("gt", '>'), ("GT", '>'),
    ("quot", '"'), ("QUOT", '"'),
    ("COPY", '\u{a9}'), ("REG", '\u{ae}'),
];

/// Numeric references 0x80..=0x9F are read as windows-1252, as browsers do.
const WINDOWS_1252: [char; 32] = [
    '\u{20ac}', '\u{81}', '\u{201a}', '\u{192}', '\u{201e}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{2c6}', '\u{2030}', '\u{160}', '\u{2039}', '\u{152}', '\u{8d}', '\u{17d}', '\u{8f}',
    '\u{90}', '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{2dc}', '\u{2122}', '\u{161}', '\u{203a}', '\u{153}', '\u{9d}', '\u{17e}', '\u{178}',
];

/// Decode every character reference in `text` in a single left-to-right pass,
/// so decoded output is never decoded again (`&amp;lt;` becomes `&lt;`).
pub(crate) fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    CHAR_REF_PATTERN.replace_all(text, |caps: &Captures| {
        if let Some(digits) = caps.get(1) {
            decode_numeric(digits.as_str(), 10)
        } else if let Some(digits) = caps.get(2) {
            decode_numeric(digits.as_str(), 16)
        } else {
            let whole = &caps[0];
            decode_named(&whole[1..]).unwrap_or_else(|| whole.to_string())
        }
    })
}

fn legacy_entity(name: &str) -> Option<char> {
    if let Some(index) = LATIN1_NAMES.iter().position(|candidate| *candidate == name) {
        return char::from_u32(0xA0 + index as u32);
    }
    ASCII_LEGACY
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, c)| *c)
}

/// `body` is the reference without its leading `&`, semicolon included if present.
fn decode_named(body: &str) -> Option<String> {
    if body.ends_with(';') {
        let reference = format!("&{}", body);
        let decoded = html_escape::decode_html_entities(&reference);
        if decoded != reference {
            return Some(decoded.into_owned());
        }
    } else if let Some(c) = legacy_entity(body) {
        return Some(c.to_string());
    }

    // Longest legacy name that is a proper prefix, e.g. `&ampx` -> `&x`.
    (2..body.len())
        .rev()
        .filter(|&end| body.is_char_boundary(end))
        .find_map(|end| legacy_entity(&body[..end]).map(|c| format!("{}{}", c, &body[end..])))
}

fn decode_numeric(digits: &str, radix: u32) -> String {
    let code = u32::from_str_radix(digits, radix).unwrap_or(u32::MAX);

    if (0x80..=0x9F).contains(&code) {
        return WINDOWS_1252[(code - 0x80) as usize].to_string();
    }
    if code == 0 || (0xD800..=0xDFFF).contains(&code) || code > 0x10FFFF {
        return '\u{fffd}'.to_string();
    }
    if is_disallowed_code_point(code) {
        return String::new();
    }

    char::from_u32(code).map(String::from).unwrap_or_else(|| '\u{fffd}'.to_string())
}

fn is_disallowed_code_point(code: u32) -> bool {
    matches!(code, 0x1..=0x8 | 0xB | 0xE..=0x1F | 0x7F..=0x9F | 0xFDD0..=0xFDEF)
        || code & 0xFFFE == 0xFFFE
}
