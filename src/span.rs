//! Spans and index-basis conversion.
//!
//! Annotation spans are offsets into the canonical text, but "offset" means
//! different things to different consumers:
//!
//! | Unit                | Who counts this way                       |
//! |---------------------|-------------------------------------------|
//! | UTF-16 code units   | JavaScript, many annotation interchange formats |
//! | Unicode codepoints  | humans, most evaluation tooling           |
//! | UTF-8 bytes         | Rust strings, regex, file I/O             |
//!
//! A document declares its basis once ([`IndexBasis`]) and every span in it is
//! interpreted under that unit. Internally the pipeline computes offsets in
//! UTF-8 bytes (the natural Rust representation) and projects them through a
//! precomputed [`OffsetTable`], so conversion is a table lookup rather than a
//! rescan of the text.

use serde::{Deserialize, Serialize};

/// A half-open span `[start, end)` in the document's declared index unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Start offset (inclusive).
    pub start: usize,
    /// End offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a span.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length in the span's unit.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if this span is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Check if `other` lies entirely within this span.
    #[must_use]
    pub const fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// The unit a document's spans are counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexUnit {
    /// UTF-16 code units (surrogate pairs count as 2).
    #[default]
    Utf16CodeUnits,
    /// Unicode codepoints.
    UnicodeCodepoints,
    /// UTF-8 bytes.
    BytesUtf8,
}

/// Declared index basis of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IndexBasis {
    /// The unit all spans in the document are counted in.
    pub unit: IndexUnit,
}

impl IndexBasis {
    /// Basis counting in the given unit.
    #[must_use]
    pub const fn new(unit: IndexUnit) -> Self {
        Self { unit }
    }
}

// =============================================================================
// OffsetTable: precomputed per-text conversion tables
// =============================================================================

/// Precomputed offset tables for one text.
///
/// Stores, per codepoint, its UTF-8 byte offset and UTF-16 code-unit offset
/// (plus a sentinel entry for the end of the text), so any conversion between
/// the three bases is a binary search or direct index. ASCII text takes an
/// identity fast path with no tables at all.
#[derive(Debug, Clone)]
pub struct OffsetTable {
    /// `bytes[cp]` = byte offset of codepoint `cp`; last entry = total bytes.
    bytes: Vec<usize>,
    /// `utf16[cp]` = UTF-16 offset of codepoint `cp`; last entry = total units.
    utf16: Vec<usize>,
    ascii: bool,
    byte_len: usize,
}

impl OffsetTable {
    /// Build the tables for `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        if text.is_ascii() {
            return Self {
                bytes: Vec::new(),
                utf16: Vec::new(),
                ascii: true,
                byte_len: text.len(),
            };
        }
        let cp_count = text.chars().count();
        let mut bytes = Vec::with_capacity(cp_count + 1);
        let mut utf16 = Vec::with_capacity(cp_count + 1);
        let mut u16_off = 0usize;
        for (byte_off, ch) in text.char_indices() {
            bytes.push(byte_off);
            utf16.push(u16_off);
            u16_off += ch.len_utf16();
        }
        bytes.push(text.len());
        utf16.push(u16_off);
        Self {
            bytes,
            utf16,
            ascii: false,
            byte_len: text.len(),
        }
    }

    /// Total length of the text in `unit`.
    #[must_use]
    pub fn len_in(&self, unit: IndexUnit) -> usize {
        if self.ascii {
            return self.byte_len;
        }
        match unit {
            IndexUnit::BytesUtf8 => self.byte_len,
            IndexUnit::UnicodeCodepoints => self.bytes.len() - 1,
            IndexUnit::Utf16CodeUnits => *self.utf16.last().unwrap_or(&0),
        }
    }

    /// Convert an offset in `unit` to a UTF-8 byte offset.
    ///
    /// Returns `None` if the offset is out of range or does not land on a
    /// codepoint boundary.
    #[must_use]
    pub fn to_byte(&self, offset: usize, unit: IndexUnit) -> Option<usize> {
        if self.ascii {
            return (offset <= self.byte_len).then_some(offset);
        }
        match unit {
            IndexUnit::BytesUtf8 => self.bytes.binary_search(&offset).ok().map(|i| self.bytes[i]),
            IndexUnit::UnicodeCodepoints => self.bytes.get(offset).copied(),
            IndexUnit::Utf16CodeUnits => {
                self.utf16.binary_search(&offset).ok().map(|i| self.bytes[i])
            }
        }
    }

    /// Convert a UTF-8 byte offset to an offset in `unit`.
    ///
    /// Returns `None` if the byte offset is out of range or mid-codepoint.
    #[must_use]
    pub fn from_byte(&self, byte: usize, unit: IndexUnit) -> Option<usize> {
        if self.ascii {
            return (byte <= self.byte_len).then_some(byte);
        }
        let cp = self.bytes.binary_search(&byte).ok()?;
        Some(match unit {
            IndexUnit::BytesUtf8 => byte,
            IndexUnit::UnicodeCodepoints => cp,
            IndexUnit::Utf16CodeUnits => self.utf16[cp],
        })
    }

    /// Project a byte range into a span counted in `unit`.
    #[must_use]
    pub fn span_from_bytes(&self, start: usize, end: usize, unit: IndexUnit) -> Option<Span> {
        Some(Span::new(
            self.from_byte(start, unit)?,
            self.from_byte(end, unit)?,
        ))
    }

    /// Project a span counted in `unit` back into a byte range.
    #[must_use]
    pub fn span_to_bytes(&self, span: Span, unit: IndexUnit) -> Option<(usize, usize)> {
        Some((self.to_byte(span.start, unit)?, self.to_byte(span.end, unit)?))
    }

    /// Re-project a span from one unit into another.
    #[must_use]
    pub fn project(&self, span: Span, from: IndexUnit, to: IndexUnit) -> Option<Span> {
        let (bs, be) = self.span_to_bytes(span, from)?;
        self.span_from_bytes(bs, be, to)
    }

    /// Slice `text` by a span counted in `unit`.
    ///
    /// `text` must be the same string the table was built from.
    #[must_use]
    pub fn slice<'a>(&self, text: &'a str, span: Span, unit: IndexUnit) -> Option<&'a str> {
        let (bs, be) = self.span_to_bytes(span, unit)?;
        text.get(bs..be)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_identity() {
        let text = "Hello World";
        let table = OffsetTable::new(text);
        for unit in [
            IndexUnit::Utf16CodeUnits,
            IndexUnit::UnicodeCodepoints,
            IndexUnit::BytesUtf8,
        ] {
            assert_eq!(table.len_in(unit), 11);
            assert_eq!(table.to_byte(5, unit), Some(5));
            assert_eq!(table.from_byte(5, unit), Some(5));
            assert_eq!(table.slice(text, Span::new(0, 5), unit), Some("Hello"));
        }
    }

    #[test]
    fn test_multibyte_lengths_differ() {
        // é = 2 bytes / 1 cp / 1 u16; 👋 = 4 bytes / 1 cp / 2 u16
        let text = "é👋";
        let table = OffsetTable::new(text);
        assert_eq!(table.len_in(IndexUnit::BytesUtf8), 6);
        assert_eq!(table.len_in(IndexUnit::UnicodeCodepoints), 2);
        assert_eq!(table.len_in(IndexUnit::Utf16CodeUnits), 3);
    }

    #[test]
    fn test_slice_under_each_basis() {
        let text = "Price €50";
        let table = OffsetTable::new(text);
        // "€50" = bytes 6..11, codepoints 6..9, utf16 6..9
        assert_eq!(
            table.slice(text, Span::new(6, 11), IndexUnit::BytesUtf8),
            Some("€50")
        );
        assert_eq!(
            table.slice(text, Span::new(6, 9), IndexUnit::UnicodeCodepoints),
            Some("€50")
        );
        assert_eq!(
            table.slice(text, Span::new(6, 9), IndexUnit::Utf16CodeUnits),
            Some("€50")
        );
    }

    #[test]
    fn test_surrogate_pair_counts_two_utf16_units() {
        let text = "a👋b";
        let table = OffsetTable::new(text);
        // 👋 occupies utf16 1..3, so 'b' starts at utf16 offset 3.
        assert_eq!(table.to_byte(3, IndexUnit::Utf16CodeUnits), Some(5));
        assert_eq!(
            table.slice(text, Span::new(3, 4), IndexUnit::Utf16CodeUnits),
            Some("b")
        );
        // Offset 2 falls inside the surrogate pair: not a codepoint boundary.
        assert_eq!(table.to_byte(2, IndexUnit::Utf16CodeUnits), None);
    }

    #[test]
    fn test_mid_codepoint_byte_rejected() {
        let text = "é";
        let table = OffsetTable::new(text);
        assert_eq!(table.from_byte(1, IndexUnit::UnicodeCodepoints), None);
        assert_eq!(table.from_byte(2, IndexUnit::UnicodeCodepoints), Some(1));
    }

    #[test]
    fn test_project_between_bases() {
        let text = "日本語 test";
        let table = OffsetTable::new(text);
        // "test" = bytes 10..14, codepoints 4..8
        let span = table
            .project(
                Span::new(10, 14),
                IndexUnit::BytesUtf8,
                IndexUnit::UnicodeCodepoints,
            )
            .unwrap();
        assert_eq!(span, Span::new(4, 8));
    }

    #[test]
    fn test_out_of_range() {
        let table = OffsetTable::new("ab");
        assert_eq!(table.to_byte(3, IndexUnit::BytesUtf8), None);
        assert_eq!(table.from_byte(3, IndexUnit::Utf16CodeUnits), None);
    }

    #[test]
    fn test_span_contains() {
        let outer = Span::new(2, 10);
        assert!(outer.contains(&Span::new(2, 10)));
        assert!(outer.contains(&Span::new(4, 6)));
        assert!(!outer.contains(&Span::new(1, 6)));
        assert!(!outer.contains(&Span::new(4, 11)));
    }
}
