use crate::workspace::byte_offset;

use super::Context;

/// The cursor's line up to UTF-16 column `character`, read from the open
/// buffer or the file on disk.
pub fn line_prefix(context: &Context, line: usize, character: usize) -> Option<String> {
    let text = context.workspace.documents().line(context.path, line)?;
    let end = byte_offset(&text, character as u32);
    Some(text[..end].to_string())
}
