//! Line-oriented extraction of directives, mixins and blocks.
//!
//! Callers only talk to [`TemplateScanner`]; [`LexicalScanner`] is the
//! regex backend. A full parser can be dropped in behind the same trait.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{
    BlockDefinition, Directive, DirectiveKind, MixinCall, MixinDefinition, MyRange, TemplateFile,
};

/// Produces a [`TemplateFile`] from a document's text.
pub trait TemplateScanner: Send + Sync + std::fmt::Debug {
    fn scan(&self, path: &Path, text: &str) -> Result<TemplateFile, ScanError>;
}

#[derive(Debug, thiserror::Error)]
#[error("failed to scan {}: {message}", .path.display())]
pub struct ScanError {
    pub path: PathBuf,
    pub message: String,
}

/// Regex scanner working one line at a time. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalScanner;

static DIRECTIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(?<kind>include|extends)\s+(?<target>"[^"]*"|'[^']*'|\S+)"#)
        .expect("directive regex")
});

static MIXIN_DEFINITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*mixin[ \t]+(?<name>[A-Za-z][A-Za-z0-9_-]*)(?:\s*\((?<params>[^)]*)\))?")
        .expect("mixin definition regex")
});

static MIXIN_CALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\+(?<name>[A-Za-z][A-Za-z0-9_-]*)(?:\((?<args>.*)\))?")
        .expect("mixin call regex")
});

static BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*block\s+(?:(?:append|prepend)\s+)?(?<name>[A-Za-z][A-Za-z0-9_-]*)")
        .expect("block regex")
});

static MIXIN_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("mixin name regex"));

/// Whether `name` is a legal mixin identifier.
pub fn is_mixin_name(name: &str) -> bool {
    MIXIN_NAME_RE.is_match(name)
}

/// `a, b = 2, ...rest` -> `["a", "b", "...rest"]`
pub fn parse_parameters(params: &str) -> Vec<String> {
    params
        .split(',')
        .filter_map(|param| {
            let name = param.split('=').next()?.trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

impl LexicalScanner {
    fn directive(path: &Path, line_no: u32, line: &str) -> Option<Directive> {
        let captures = DIRECTIVE_RE.captures(line)?;
        let kind = match captures.name("kind")?.as_str() {
            "include" => DirectiveKind::Include,
            _ => DirectiveKind::Extends,
        };
        let target = captures.name("target")?;

        Some(Directive {
            kind,
            raw_target: target.as_str().to_string(),
            line: line_no,
            range: MyRange::from_line_span(line_no, line, target.range()),
            source: path.to_path_buf(),
        })
    }

    fn mixin_definition(path: &Path, line_no: u32, line: &str) -> Option<MixinDefinition> {
        let captures = MIXIN_DEFINITION_RE.captures(line)?;
        let name = captures.name("name")?;

        Some(MixinDefinition {
            name: name.as_str().to_string(),
            parameters: captures
                .name("params")
                .map(|params| parse_parameters(params.as_str()))
                .unwrap_or_default(),
            path: path.to_path_buf(),
            range: MyRange::from_line_span(line_no, line, name.range()),
        })
    }

    fn mixin_call(line_no: u32, line: &str) -> Option<MixinCall> {
        let captures = MIXIN_CALL_RE.captures(line)?;
        let name = captures.name("name")?;

        Some(MixinCall {
            name: name.as_str().to_string(),
            arguments: captures.name("args").map(|args| args.as_str().to_string()),
            range: MyRange::from_line_span(line_no, line, name.range()),
        })
    }

    fn block(line_no: u32, line: &str) -> Option<BlockDefinition> {
        let captures = BLOCK_RE.captures(line)?;
        let name = captures.name("name")?;

        Some(BlockDefinition {
            name: name.as_str().to_string(),
            range: MyRange::from_line_span(line_no, line, name.range()),
        })
    }
}

impl TemplateScanner for LexicalScanner {
    fn scan(&self, path: &Path, text: &str) -> Result<TemplateFile, ScanError> {
        let mut file = TemplateFile {
            path: path.to_path_buf(),
            ..Default::default()
        };

        for (i, line) in text.lines().enumerate() {
            let line_no = i as u32;

            if let Some(directive) = Self::directive(path, line_no, line) {
                file.directives.push(directive);
            } else if let Some(mixin) = Self::mixin_definition(path, line_no, line) {
                file.mixins.push(mixin);
            } else if let Some(call) = Self::mixin_call(line_no, line) {
                file.calls.push(call);
            } else if let Some(block) = Self::block(line_no, line) {
                file.blocks.push(block);
            }
        }

        Ok(file)
    }
}
