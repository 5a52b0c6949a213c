// crates/matecv-core/src/replace.rs
//
// Byte-level substitution of encoded strings, used to rewrite references in
// files without a structural parse.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;

use regex::bytes::{Captures, Regex, RegexBuilder};

use crate::codec::comstr;

/// Compiled set of `old -> new` string substitutions.
///
/// Keys match case-insensitively (ASCII folding) and only as complete encoded
/// strings: the varint length prefix is part of every alternative and is
/// matched exactly, so a key never matches inside a longer string payload.
#[derive(Debug, Default)]
pub struct BinaryReplacer {
    pattern: Option<Regex>,
    repls: HashMap<String, Vec<u8>>,
}

impl BinaryReplacer {
    pub fn compile<I, K, V>(mapping: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut repls = HashMap::new();
        let mut keys: Vec<Vec<u8>> = Vec::new();
        for (k, v) in mapping {
            let key = k.as_ref().to_lowercase();
            keys.push(comstr::encode(&key));
            repls.insert(key, comstr::encode(v.as_ref()));
        }
        if keys.is_empty() {
            return Ok(Self { pattern: None, repls });
        }

        // Longest first so no alternative shadows a longer one.
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        keys.dedup();

        let mut src = String::from("(?i-u)");
        for (n, key) in keys.iter().enumerate() {
            if n > 0 {
                src.push('|');
            }
            push_encoded_key(&mut src, key);
        }

        let pattern = RegexBuilder::new(&src).unicode(false).size_limit(64 << 20).build()?;
        Ok(Self { pattern: Some(pattern), repls })
    }

    pub fn is_empty(&self) -> bool {
        self.repls.is_empty()
    }

    /// Substitute every non-overlapping match. Bytes outside matches are
    /// returned untouched; the input is borrowed back when nothing matched.
    pub fn replace<'a>(&self, data: &'a [u8]) -> Cow<'a, [u8]> {
        match &self.pattern {
            Some(re) => re.replace_all(data, |caps: &Captures<'_>| self.replacement(&caps[0])),
            None => Cow::Borrowed(data),
        }
    }

    fn replacement(&self, matched: &[u8]) -> Vec<u8> {
        comstr::decode(matched)
            .ok()
            .and_then(|s| self.repls.get(&s.to_lowercase()))
            .cloned()
            .unwrap_or_else(|| matched.to_vec())
    }
}

fn push_encoded_key(src: &mut String, key: &[u8]) {
    let prefix_len = prefix_len(key);
    src.push_str("(?-i:");
    for b in &key[..prefix_len] {
        push_byte(src, *b);
    }
    src.push(')');
    for b in &key[prefix_len..] {
        push_byte(src, *b);
    }
}

fn prefix_len(encoded: &[u8]) -> usize {
    encoded.iter().position(|b| b & 0x80 == 0).map_or(encoded.len(), |p| p + 1)
}

fn push_byte(src: &mut String, b: u8) {
    if b.is_ascii_alphanumeric() {
        src.push(b as char);
    } else {
        let _ = write!(src, "\\x{b:02X}");
    }
}
