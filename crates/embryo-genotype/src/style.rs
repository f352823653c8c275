//! Token classification for syntax highlighting

use embryo_alphabet::{Alphabet, NeuronProperty, Sign};
use serde::{Deserialize, Serialize};

use crate::parser::{scan_bracket, scan_quote};

/// Display class of the character at some offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Style {
    /// `<` and `>`
    Structure,
    /// `X` and `N`
    Differentiation,
    Modifier,
    NeuronProperty,
    Connection,
    Repetition,
    ClassName,
    Whitespace,
    Unknown,
}

/// Classify the token covering byte `offset` of `text`.
///
/// Tokens are recognised the way the parser reads them, so the answer does
/// not depend on whether the text as a whole is valid.
pub fn style(alphabet: &Alphabet, text: &str, offset: usize) -> Style {
    let mut pos = 0;
    while pos < text.len() {
        let (style, len) = token_at(alphabet, text, pos);
        if offset < pos + len {
            return style;
        }
        pos += len.max(1);
    }
    Style::Unknown
}

/// Style and byte length of the token starting at `pos`
fn token_at(alphabet: &Alphabet, text: &str, pos: usize) -> (Style, usize) {
    let bytes = text.as_bytes();
    let end = text.len();
    let rest = &text[pos..];
    let Some(c) = rest.chars().next() else {
        return (Style::Unknown, 1);
    };

    match c {
        c if c.is_whitespace() => (Style::Whitespace, c.len_utf8()),
        '<' | '>' => (Style::Structure, 1),
        'X' | 'N' => (Style::Differentiation, 1),
        '#' => {
            let digits = rest[1..].bytes().take_while(u8::is_ascii_digit).count();
            (Style::Repetition, 1 + digits)
        }
        '[' => {
            let close = scan_bracket(bytes, pos + 1, end).unwrap_or(end - 1);
            (Style::Connection, close + 1 - pos)
        }
        '"' => {
            let close = scan_quote(bytes, pos + 1, end).unwrap_or(end - 1);
            (Style::ClassName, close + 1 - pos)
        }
        ':' => {
            let mut chars = rest.chars().skip(1);
            let well_formed = chars.next().and_then(Sign::from_symbol).is_some()
                && chars.next().and_then(NeuronProperty::from_symbol).is_some()
                && chars.next() == Some(':');
            if well_formed {
                (Style::NeuronProperty, 4)
            } else {
                (Style::Unknown, 1)
            }
        }
        c if alphabet.is_modifier(c) => (Style::Modifier, 1),
        c => match alphabet.neurons.longest_prefix(rest) {
            Some(class) => (Style::ClassName, class.name.len()),
            None => (Style::Unknown, c.len_utf8()),
        },
    }
}
