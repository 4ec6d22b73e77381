//! The mask preprocessor.
//!
//! A mask block declares named bit fields with widths:
//!
//! ```text
//! mask Header { version: 4; flags: 1; any: 3; }
//! ```
//!
//! Fields are assigned a running bit offset in declaration order. The block
//! itself is erased from the source, and every `Header.field` reference is
//! replaced with the resolved offset (`"0:4"` for `version`, `"4"` for the
//! width-1 `flags`). A field named `any` advances the offset without
//! producing an entry. Later phases therefore only ever see numeric bounds.

use log::debug;
use rustc_hash::FxHashMap;

use crate::error::MaskError;
use crate::reader::{self, Reader};

/// Expand all mask blocks in `source`.
///
/// Line comments are stripped (their terminating newline is kept) and mask
/// blocks are erased down to their contained newlines, so the line and
/// column positions of the remaining text survive. Substitution runs to a
/// fixed point; any `word.word` reference left over afterwards fails with
/// [`MaskError::UnknownField`].
pub fn expand(source: &str) -> Result<String, MaskError> {
    let (stripped, masks) = collect(source);
    debug!("collected {} mask substitutions", masks.len());

    let output = substitute(stripped, &masks);
    validate(&output, &masks)?;

    Ok(output)
}

/// Scan the source once: strip comments, erase mask blocks and collect the
/// substitution dictionary.
pub(crate) fn collect(source: &str) -> (String, FxHashMap<String, String>) {
    let mut r = Reader::new(source);
    let mut out = Vec::new();
    let mut masks = FxHashMap::default();

    while let Some(b) = r.peek_byte() {
        if b == b'/' && r.peek_at(1) == Some(b'/') {
            skip_comment(&mut r, &mut out);
            continue;
        }

        let boundary = out.last().is_none_or(|&p| !reader::is_word(p));
        if boundary && at_keyword(&r, "mask") {
            scan_block(&mut r, &mut out, &mut masks);
            continue;
        }

        out.push(b);
        r.forward();
    }

    // Only whole byte runs are ever dropped, so the output is still UTF-8.
    (String::from_utf8_lossy(&out).into_owned(), masks)
}

/// Whether the reader sits on `kw` followed by a word boundary.
fn at_keyword(r: &Reader<'_>, kw: &str) -> bool {
    kw.bytes().enumerate().all(|(i, b)| r.peek_at(i) == Some(b))
        && r.peek_at(kw.len()).is_none_or(|b| !reader::is_word(b))
}

/// Skip a `//` comment, keeping its terminating newline.
fn skip_comment(r: &mut Reader<'_>, out: &mut Vec<u8>) {
    r.forward_while(|b| b != b'\n');
    if r.eat(|b| b == b'\n').is_some() {
        out.push(b'\n');
    }
}

/// Skip whitespace, keeping newlines in the output.
fn skip_space(r: &mut Reader<'_>, out: &mut Vec<u8>) {
    while let Some(b) = r.peek_byte() {
        if !b.is_ascii_whitespace() {
            break;
        }
        if b == b'\n' {
            out.push(b'\n');
        }
        r.forward();
    }
}

/// Consume one `mask` block, recording its field offsets.
fn scan_block(r: &mut Reader<'_>, out: &mut Vec<u8>, masks: &mut FxHashMap<String, String>) {
    r.forward_tag("mask");
    skip_space(r, out);

    let name_start = r.offset();
    r.forward_while(reader::is_word);
    let name = r.slice_from(name_start).to_string();

    while let Some(b) = r.peek_byte() {
        if b == b'{' {
            r.forward();
            break;
        }
        if b == b'\n' {
            out.push(b'\n');
        }
        r.forward();
    }

    let mut offset: u64 = 0;
    loop {
        skip_space(r, out);

        if r.peek_byte() == Some(b'/') && r.peek_at(1) == Some(b'/') {
            skip_comment(r, out);
            continue;
        }

        match r.peek_byte() {
            None => break,
            Some(b'}') => {
                r.forward();
                break;
            }
            Some(_) => {}
        }

        let field_start = r.offset();
        r.forward_while(reader::is_word);
        let field = r.slice_from(field_start).to_string();

        skip_space(r, out);
        r.eat(|b| b == b':');
        skip_space(r, out);

        let num_start = r.offset();
        r.forward_while(|b| b.is_ascii_digit());
        let width: u64 = r.slice_from(num_start).parse().unwrap_or(0);

        if field == "any" {
            offset += width;
        } else {
            let start = offset;
            let end = start + width;
            if !name.is_empty() {
                let value = if width == 1 {
                    start.to_string()
                } else {
                    format!("{start}:{end}")
                };
                masks.insert(format!("{name}.{field}"), value);
            }
            offset = end;
        }

        while let Some(b) = r.peek_byte() {
            if b == b';' || b == b'}' {
                break;
            }
            if b == b'\n' {
                out.push(b'\n');
            }
            r.forward();
        }
        r.eat(|b| b == b';');
    }

    // A block may be terminated like a statement.
    r.eat(|b| b == b';');
}

/// Apply the dictionary until a fixed point is reached.
///
/// A match only counts when the characters on both sides are absent or
/// non-word, so references embedded in longer identifiers are left alone.
/// Substitution values consist of digits and `:` only, so no replacement
/// can re-introduce a key and the loop terminates.
fn substitute(mut text: String, masks: &FxHashMap<String, String>) -> String {
    let mut changed = true;
    while changed {
        changed = false;
        for (key, value) in masks {
            let mut search = 0;
            while let Some(found) = text[search..].find(key.as_str()) {
                let pos = search + found;
                let end = pos + key.len();
                let before_ok = pos == 0 || !reader::is_word(text.as_bytes()[pos - 1]);
                let after_ok = end >= text.len() || !reader::is_word(text.as_bytes()[end]);

                if before_ok && after_ok {
                    text.replace_range(pos..end, value);
                    search = pos + value.len();
                    changed = true;
                } else {
                    search = end;
                }
            }
        }
    }

    text
}

/// Every remaining `word.word` must name a known substitution.
fn validate(text: &str, masks: &FxHashMap<String, String>) -> Result<(), MaskError> {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'.' {
            continue;
        }

        let mut start = i;
        while start > 0 && reader::is_word(bytes[start - 1]) {
            start -= 1;
        }
        let mut end = i + 1;
        while end < bytes.len() && reader::is_word(bytes[end]) {
            end += 1;
        }

        let key = String::from_utf8_lossy(&bytes[start..end]).into_owned();
        if !masks.contains_key(&key) {
            return Err(MaskError::UnknownField(key));
        }
    }

    Ok(())
}
