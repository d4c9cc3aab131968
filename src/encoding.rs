//! Encoding identification and decoding using chardetng and `encoding_rs`.

use std::borrow::Cow;

use simdutf8::basic::from_utf8;

/// Latin-accented letters used to correct under-confident classification on
/// accented regional text.
const ACCENTED_LETTERS: &str = "áéíóúàèìòùâêîôûãõçÁÉÍÓÚÀÈÌÒÙÂÊÎÔÛÃÕÇ";

/// A character encoding with a normalized identity.
///
/// The variants cover the fixed candidate set used by the read-path fallback
/// cascade; anything else the classifier reports is carried as
/// [`TextEncoding::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8.
    Utf8,
    /// ISO-8859-1. Decodes every byte sequence, so it terminates the cascade.
    Latin1,
    /// Windows-1252.
    Cp1252,
    /// UTF-16 little-endian (BOM `FF FE`).
    Utf16Le,
    /// UTF-16 big-endian (BOM `FE FF`).
    Utf16Be,
    /// Any other encoding the classifier reported.
    Other(&'static encoding_rs::Encoding),
}

/// Encoding candidates tried, in order, when the detected encoding fails to
/// decode the input.
pub const ENCODING_CANDIDATES: [TextEncoding; 4] = [
    TextEncoding::Utf8,
    TextEncoding::Latin1,
    TextEncoding::Utf16Le,
    TextEncoding::Cp1252,
];

impl TextEncoding {
    /// Normalize an encoding label through the fixed alias table.
    ///
    /// Labels the table does not know are resolved through the WHATWG label
    /// registry; an unresolvable label falls back to UTF-8.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => TextEncoding::Utf8,
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" => TextEncoding::Latin1,
            "windows-1252" | "cp1252" => TextEncoding::Cp1252,
            "utf-16" | "utf-16le" | "utf-16-le" => TextEncoding::Utf16Le,
            "utf-16be" | "utf-16-be" => TextEncoding::Utf16Be,
            other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
                Some(enc) if enc == encoding_rs::UTF_8 => TextEncoding::Utf8,
                Some(enc) => TextEncoding::Other(enc),
                None => TextEncoding::Utf8,
            },
        }
    }

    /// The normalized label for this encoding.
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "ISO-8859-1",
            TextEncoding::Cp1252 => "cp1252",
            TextEncoding::Utf16Le => "utf-16",
            TextEncoding::Utf16Be => "utf-16-be",
            TextEncoding::Other(enc) => enc.name(),
        }
    }

    /// Whether the byte stream cannot be split into CSV fields before
    /// decoding. UTF-16 input is decoded wholesale to UTF-8 up front.
    pub fn requires_full_decode(&self) -> bool {
        matches!(self, TextEncoding::Utf16Le | TextEncoding::Utf16Be)
    }

    /// Strictly decode a single CSV field. Returns `None` when the bytes are
    /// not valid under this encoding, which triggers the encoding fallback
    /// cascade upstream.
    pub fn decode_field<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            TextEncoding::Utf8 => from_utf8(bytes).ok().map(Cow::Borrowed),
            TextEncoding::Latin1 => Some(decode_latin1(bytes)),
            TextEncoding::Cp1252 => encoding_rs::WINDOWS_1252
                .decode_without_bom_handling_and_without_replacement(bytes),
            // Fields only exist post-decode for UTF-16 input.
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => None,
            TextEncoding::Other(enc) => {
                enc.decode_without_bom_handling_and_without_replacement(bytes)
            }
        }
    }

    /// Strictly decode a whole byte buffer, removing a BOM if present.
    pub fn decode_all(&self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => from_utf8(skip_utf8_bom(bytes)).ok().map(str::to_owned),
            TextEncoding::Latin1 => Some(decode_latin1(bytes).into_owned()),
            TextEncoding::Cp1252 => encoding_rs::WINDOWS_1252
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(Cow::into_owned),
            TextEncoding::Utf16Le => strict_decode(encoding_rs::UTF_16LE, bytes),
            TextEncoding::Utf16Be => strict_decode(encoding_rs::UTF_16BE, bytes),
            TextEncoding::Other(enc) => strict_decode(enc, bytes),
        }
    }

    /// Decode with replacement characters instead of failing. Used by the
    /// detector, which must never raise on malformed text.
    pub fn decode_lossy<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(skip_utf8_bom(bytes)),
            TextEncoding::Latin1 => decode_latin1(bytes),
            TextEncoding::Cp1252 => {
                let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
                text
            }
            TextEncoding::Utf16Le => {
                let (text, _, _) = encoding_rs::UTF_16LE.decode(bytes);
                text
            }
            TextEncoding::Utf16Be => {
                let (text, _, _) = encoding_rs::UTF_16BE.decode(bytes);
                text
            }
            TextEncoding::Other(enc) => {
                let (text, _, _) = enc.decode(bytes);
                text
            }
        }
    }
}

fn strict_decode(enc: &'static encoding_rs::Encoding, bytes: &[u8]) -> Option<String> {
    let (text, _, had_errors) = enc.decode(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

/// ISO-8859-1 maps every byte directly to the matching Unicode scalar, so
/// decoding never fails.
fn decode_latin1(bytes: &[u8]) -> Cow<'_, str> {
    if bytes.is_ascii() {
        // Safe borrow: ASCII is valid UTF-8.
        match std::str::from_utf8(bytes) {
            Ok(s) => Cow::Borrowed(s),
            Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
        }
    } else {
        Cow::Owned(bytes.iter().map(|&b| b as char).collect())
    }
}

/// Skip the UTF-8 BOM if present and return the remaining data.
pub fn skip_utf8_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Sniff 16-bit byte-order marks. chardetng does not handle UTF-16, so this
/// runs before the classifier.
pub fn sniff_utf16_bom(data: &[u8]) -> Option<TextEncoding> {
    if data.len() >= 2 {
        if data[0] == 0xFF && data[1] == 0xFE {
            return Some(TextEncoding::Utf16Le);
        }
        if data[0] == 0xFE && data[1] == 0xFF {
            return Some(TextEncoding::Utf16Be);
        }
    }
    None
}

/// Whether the text contains at least one Latin-accented letter.
pub fn has_accented_latin(text: &str) -> bool {
    text.chars().any(|c| ACCENTED_LETTERS.contains(c))
}

/// Classify a byte sample with the statistical detector.
///
/// When the assessment reports low confidence, the sample is re-checked under
/// ISO-8859-1 and that encoding is re-accepted if the decoded text carries a
/// Latin-accented letter.
#[cfg(feature = "chardet")]
pub(crate) fn classify(sample: &[u8]) -> TextEncoding {
    use chardetng::EncodingDetector;

    if let Some(enc) = sniff_utf16_bom(sample) {
        return enc;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, true);
    let (guess, confident) = detector.guess_assess(None, true);
    let mut detected = TextEncoding::from_label(guess.name());

    if !confident {
        let text = TextEncoding::Latin1.decode_lossy(sample);
        if has_accented_latin(&text) {
            detected = TextEncoding::Latin1;
        }
    }

    detected
}

/// Classify a byte sample without the statistical detector: BOM sniffing for
/// 16-bit encodings, then a decode-attempt cascade with the Latin-accented
/// check first.
#[cfg(not(feature = "chardet"))]
pub(crate) fn classify(sample: &[u8]) -> TextEncoding {
    if let Some(enc) = sniff_utf16_bom(sample) {
        return enc;
    }

    let text = TextEncoding::Latin1.decode_lossy(sample);
    if has_accented_latin(&text) {
        return TextEncoding::Latin1;
    }

    if from_utf8(sample).is_ok() {
        TextEncoding::Utf8
    } else {
        TextEncoding::Latin1
    }
}
