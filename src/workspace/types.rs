//! Core types for workspace data structures.
//!
//! This module contains the values the scanner extracts from a template:
//! - `MyRange`: A wrapper around LSP Range with additional utilities
//! - `Directive`: an `include`/`extends` line and its target span
//! - `MixinDefinition` / `MixinCall`: `mixin name(..)` and `+name(..)`
//! - `TemplateFile`: everything extracted from one document

use std::ops::Deref;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{Location, Position, Url};

/// A wrapper around `tower_lsp::lsp_types::Range` with additional utilities.
///
/// Columns are counted in UTF-16 code units, the LSP default position
/// encoding, so they compare directly with client cursor positions.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct MyRange(pub tower_lsp::lsp_types::Range);

impl MyRange {
    /// A single-line range from char column `start` to `end`.
    pub fn on_line(line: u32, start: u32, end: u32) -> MyRange {
        tower_lsp::lsp_types::Range {
            start: Position {
                line,
                character: start,
            },
            end: Position {
                line,
                character: end,
            },
        }
        .into()
    }

    /// Converts a byte span of `text` (one line) into a UTF-16 column range.
    pub fn from_line_span(line: u32, text: &str, span: std::ops::Range<usize>) -> MyRange {
        MyRange::on_line(line, utf16_column(text, span.start), utf16_column(text, span.end))
    }
}

/// UTF-16 column of byte offset `byte` in `line`.
pub fn utf16_column(line: &str, byte: usize) -> u32 {
    line.get(..byte)
        .map(|s| s.encode_utf16().count())
        .unwrap_or(0) as u32
}

/// Byte offset of UTF-16 column `column` in `line`, clamped to the line's
/// length. A column inside a surrogate pair rounds down to its char.
pub fn byte_offset(line: &str, column: u32) -> usize {
    let mut units = 0;
    for (offset, ch) in line.char_indices() {
        units += ch.len_utf16() as u32;
        if units > column {
            return offset;
        }
    }
    line.len()
}

impl std::hash::Hash for MyRange {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.start.line.hash(state);
        self.0.start.character.hash(state);
        self.0.end.line.hash(state);
        self.0.end.character.hash(state);
    }
}

impl Deref for MyRange {
    type Target = tower_lsp::lsp_types::Range;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<tower_lsp::lsp_types::Range> for MyRange {
    fn from(range: tower_lsp::lsp_types::Range) -> Self {
        MyRange(range)
    }
}

/// Trait for types that have a range (position span in the document).
pub trait Rangeable {
    fn range(&self) -> &MyRange;

    /// Inclusive on both ends, so a cursor sitting right after the last
    /// character of a name still counts as "on" it.
    fn includes_position(&self, position: Position) -> bool {
        let range = self.range();
        (range.start.line < position.line
            || (range.start.line == position.line && range.start.character <= position.character))
            && (range.end.line > position.line
                || (range.end.line == position.line && range.end.character >= position.character))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectiveKind {
    Include,
    Extends,
}

impl DirectiveKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            DirectiveKind::Include => "include",
            DirectiveKind::Extends => "extends",
        }
    }
}

/// An `include` or `extends` line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Directive {
    pub kind: DirectiveKind,
    /// The target as written, quotes included.
    pub raw_target: String,
    /// 0-based line in `source`.
    pub line: u32,
    /// Span of `raw_target` on the line.
    pub range: MyRange,
    pub source: PathBuf,
}

impl Directive {
    /// The target with surrounding quotes removed, ready for resolution.
    pub fn target(&self) -> &str {
        strip_quotes(&self.raw_target)
    }
}

impl Rangeable for Directive {
    fn range(&self) -> &MyRange {
        &self.range
    }
}

/// Removes one pair of matching `'` or `"` around `text`.
pub fn strip_quotes(text: &str) -> &str {
    let text = text.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

/// One `mixin name(params)` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MixinDefinition {
    pub name: String,
    /// Parameter names in declaration order; default values are dropped.
    pub parameters: Vec<String>,
    pub path: PathBuf,
    /// Span of the name token.
    pub range: MyRange,
}

impl MixinDefinition {
    /// `mixin name(a, b)` as it would be written, without default values.
    pub fn signature(&self) -> String {
        match self.parameters.is_empty() {
            true => format!("mixin {}", self.name),
            false => format!("mixin {}({})", self.name, self.parameters.join(", ")),
        }
    }

    pub fn location(&self) -> Option<Location> {
        Some(Location {
            uri: Url::from_file_path(&self.path).ok()?,
            range: *self.range,
        })
    }
}

impl Rangeable for MixinDefinition {
    fn range(&self) -> &MyRange {
        &self.range
    }
}

/// A `+name(args)` call at the start of a line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MixinCall {
    pub name: String,
    pub arguments: Option<String>,
    /// Span of the name token, without the `+`.
    pub range: MyRange,
}

impl Rangeable for MixinCall {
    fn range(&self) -> &MyRange {
        &self.range
    }
}

/// A `block name` declaration (including `block append|prepend name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockDefinition {
    pub name: String,
    pub range: MyRange,
}

impl Rangeable for BlockDefinition {
    fn range(&self) -> &MyRange {
        &self.range
    }
}

/// Everything the scanner extracted from one template document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    pub path: PathBuf,
    pub directives: Vec<Directive>,
    pub mixins: Vec<MixinDefinition>,
    pub calls: Vec<MixinCall>,
    pub blocks: Vec<BlockDefinition>,
}

impl TemplateFile {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()?.to_str()
    }

    pub fn directive_on_line(&self, line: u32) -> Option<&Directive> {
        self.directives.iter().find(|d| d.line == line)
    }

    pub fn call_at(&self, position: Position) -> Option<&MixinCall> {
        self.calls.iter().find(|c| c.includes_position(position))
    }

    pub fn mixin_at(&self, position: Position) -> Option<&MixinDefinition> {
        self.mixins.iter().find(|m| m.includes_position(position))
    }

    pub fn block_at(&self, position: Position) -> Option<&BlockDefinition> {
        self.blocks.iter().find(|b| b.includes_position(position))
    }

    /// Name of the mixin whose definition or call name is under the cursor.
    pub fn mixin_name_at(&self, position: Position) -> Option<(&str, MyRange)> {
        self.call_at(position)
            .map(|call| (call.name.as_str(), call.range))
            .or_else(|| {
                self.mixin_at(position)
                    .map(|def| (def.name.as_str(), def.range))
            })
    }

    pub fn mixins_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a MixinDefinition> + 'a {
        self.mixins.iter().filter(move |m| m.name == name)
    }
}

/// Location pointing at the very start of `path`.
pub fn file_location(path: &Path) -> Option<Location> {
    Some(Location {
        uri: Url::from_file_path(path).ok()?,
        range: *MyRange::on_line(0, 0, 0),
    })
}
