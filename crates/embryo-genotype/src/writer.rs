//! Serialization of a program tree back into genotype text

use std::fmt::Write as _;

use embryo_alphabet::{Alphabet, is_structural};

use crate::tree::{GenoTree, LinkSource, NodeKind};

/// Characters that would confuse the closing-token scan if left bare
const SCAN_SENSITIVE: &[char] = &['<', '>', '#', '[', ']', ':', '"'];

impl GenoTree {
    /// Render the program as genotype text.
    ///
    /// Tokens appear in pre-order: each node, then its first child, then its
    /// second. Class names are quoted whenever the bare spelling would be
    /// tokenised differently by the parser.
    pub fn write(&self, alphabet: &Alphabet) -> String {
        let mut out = String::new();
        for id in self.program_nodes() {
            write_token(&mut out, &self.node(id).kind, alphabet);
        }
        out
    }
}

fn write_token(out: &mut String, kind: &NodeKind, alphabet: &Alphabet) {
    match kind {
        NodeKind::Root => {}
        NodeKind::Terminal => out.push('>'),
        NodeKind::Division => out.push('<'),
        NodeKind::Repetition { count } => {
            let _ = write!(out, "#{}", count);
        }
        NodeKind::Connection { source, weight } => {
            out.push('[');
            match source {
                LinkSource::Relative(offset) => {
                    let _ = write!(out, "{}", offset);
                }
                LinkSource::Sensor(name) => write_class(out, name, alphabet),
            }
            let _ = write!(out, ":{}]", weight);
        }
        NodeKind::NeuronProperty { sign, property } => {
            out.push(':');
            out.push(sign.symbol());
            out.push(property.symbol());
            out.push(':');
        }
        NodeKind::Modifier(c) => out.push(*c),
        NodeKind::Differentiate(kind) => out.push(kind.symbol()),
        NodeKind::ClassName(name) => write_class(out, name, alphabet),
    }
}

fn write_class(out: &mut String, name: &str, alphabet: &Alphabet) {
    if needs_quotes(name, alphabet) {
        out.push('"');
        out.push_str(name);
        out.push('"');
    } else {
        out.push_str(name);
    }
}

/// Whether a bare class name would not parse back as itself
pub(crate) fn needs_quotes(name: &str, alphabet: &Alphabet) -> bool {
    let Some(first) = name.chars().next() else {
        return true;
    };
    is_structural(first)
        || alphabet.is_modifier(first)
        || first.is_ascii_digit()
        || first == '+'
        || first == '-'
        || name.chars().any(|c| c.is_whitespace() || SCAN_SENSITIVE.contains(&c))
        || alphabet.neurons.has_extension_of(name)
}
