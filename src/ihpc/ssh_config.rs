//! OpenSSH client configuration parsing, merging and rendering.
//!
//! The merge pipeline is a chain of pure steps:
//!
//! 1. **Parse**: a two-state line scanner (`OutsideBlock` / `InsideBlock`)
//!    splits the text into a preamble and an ordered list of [`HostBlock`]s.
//!    A new block starts at every line whose first token is the `Host` keyword.
//! 2. **Upsert**: the target block is created, or its `HostName`, `User` and
//!    `ProxyJump` directives are rewritten in place.
//! 3. **Sort**: blocks are ordered by [`NodeOrderKey`].
//! 4. **Render**: the preamble and blocks are joined back into text.
//!
//! # Layout Policy
//!
//! - Lines before the first `Host` line form the preamble, which stays at the
//!   top of the file and is never sorted.
//! - Blank lines and comments belong to the block they trail.
//! - Trailing blank lines of every section are dropped and sections are
//!   separated by exactly one blank line. The output ends with a newline.
//! - Everything else inside a block is reproduced byte for byte.
//! - The line terminator of the first line (`\n` or `\r\n`) is used for the
//!   whole output. Mixed endings are normalized to it.
//!
//! These rules make [`merge_host`] idempotent: merging the same host twice
//! yields the same text as merging it once.

use tracing::debug;

use super::config::NODE_FAMILIES;
use super::types::NetworkLocation;

/// Indentation used for directives this module writes into new blocks.
const DIRECTIVE_INDENT: &str = "  ";

/// One `Host <pattern>` declaration and every line up to the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBlock {
    pattern: String,
    lines: Vec<String>,
}

impl HostBlock {
    /// The text following the `Host` keyword, trimmed.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The `Host` line followed by the lines belonging to it.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Value of the first directive named `keyword` (case-insensitive).
    pub fn directive(&self, keyword: &str) -> Option<&str> {
        self.lines
            .iter()
            .skip(1)
            .filter_map(|line| split_directive(line))
            .find(|(name, _)| name.eq_ignore_ascii_case(keyword))
            .map(|(_, value)| value)
    }

    fn synthesize(pattern: &str, fields: &HostFields) -> Self {
        let mut lines = vec![
            format!("Host {}", pattern),
            format_directive(DIRECTIVE_INDENT, "HostName", &fields.hostname),
            format_directive(DIRECTIVE_INDENT, "User", &fields.user),
        ];
        if let JumpPolicy::Via(jump) = &fields.proxy_jump {
            lines.push(format_directive(DIRECTIVE_INDENT, "ProxyJump", jump));
        }

        Self {
            pattern: pattern.to_string(),
            lines,
        }
    }

    fn with_fields(&self, fields: &HostFields) -> Self {
        let mut lines = self.lines.clone();
        set_directive(&mut lines, "HostName", Some(fields.hostname.as_str()));
        set_directive(&mut lines, "User", Some(fields.user.as_str()));
        match &fields.proxy_jump {
            JumpPolicy::Via(jump) => set_directive(&mut lines, "ProxyJump", Some(jump.as_str())),
            JumpPolicy::Direct => set_directive(&mut lines, "ProxyJump", None),
            JumpPolicy::Unmanaged => {}
        }

        Self {
            pattern: self.pattern.clone(),
            lines,
        }
    }
}

/// A configuration file split into its preamble and host blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedConfig {
    /// Lines before the first `Host` line.
    pub preamble: Vec<String>,
    /// Host blocks in file order.
    pub blocks: Vec<HostBlock>,
    /// Line terminator used when rendering.
    pub line_ending: LineEnding,
}

/// Line terminator of a configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    /// `CrLf` when the first line of `text` ends in `\r\n`.
    pub fn detect(text: &str) -> Self {
        match text.find('\n') {
            Some(end) if text[..end].ends_with('\r') => Self::CrLf,
            _ => Self::Lf,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// How the `ProxyJump` directive of a merged block is treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpPolicy {
    /// Tunnel through the given host.
    Via(String),
    /// Connect directly; any existing `ProxyJump` line is removed.
    Direct,
    /// Leave whatever the user wrote.
    Unmanaged,
}

/// Connection parameters written into a host block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFields {
    pub hostname: String,
    pub user: String,
    pub proxy_jump: JumpPolicy,
}

/// Result of configuring a node block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The complete new configuration text.
    pub config: String,
    /// The gateway block or its `User` was missing; the node was written
    /// with an empty user and the gateway must be configured.
    pub needs_gateway_setup: bool,
}

/// Sort key for host blocks: node family, then node number, then raw pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeOrderKey {
    family_rank: usize,
    numeric_suffix: u64,
    pattern: String,
}

impl NodeOrderKey {
    pub fn for_pattern(pattern: &str) -> Self {
        let family_len = pattern
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(pattern.len());
        let family = &pattern[..family_len];
        let family_rank = NODE_FAMILIES
            .iter()
            .position(|known| known.eq_ignore_ascii_case(family))
            .unwrap_or(NODE_FAMILIES.len());

        let stem = pattern.trim_end_matches(|c: char| c.is_ascii_digit());
        let digits = &pattern[stem.len()..];
        let numeric_suffix = if digits.is_empty() {
            0
        } else {
            // Only overflow can fail here; such a suffix sorts after every real node.
            digits.parse::<u64>().unwrap_or(u64::MAX)
        };

        Self {
            family_rank,
            numeric_suffix,
            pattern: pattern.to_string(),
        }
    }
}

enum ScanState {
    OutsideBlock,
    InsideBlock(HostBlock),
}

/// Split configuration text into a preamble and host blocks. Never fails.
pub fn parse_config(text: &str) -> ParsedConfig {
    let mut parsed = ParsedConfig {
        line_ending: LineEnding::detect(text),
        ..ParsedConfig::default()
    };
    let mut state = ScanState::OutsideBlock;

    for line in text.lines() {
        if let Some(pattern) = host_pattern(line) {
            if let ScanState::InsideBlock(block) =
                std::mem::replace(&mut state, ScanState::OutsideBlock)
            {
                parsed.blocks.push(block);
            }
            state = ScanState::InsideBlock(HostBlock {
                pattern: pattern.to_string(),
                lines: vec![line.to_string()],
            });
            continue;
        }

        match &mut state {
            ScanState::OutsideBlock => parsed.preamble.push(line.to_string()),
            ScanState::InsideBlock(block) => block.lines.push(line.to_string()),
        }
    }

    if let ScanState::InsideBlock(block) = state {
        parsed.blocks.push(block);
    }

    parsed
}

/// Join a parsed configuration back into text using the layout policy above.
pub fn render_config(parsed: &ParsedConfig) -> String {
    let mut sections: Vec<&[String]> = Vec::with_capacity(parsed.blocks.len() + 1);

    let preamble = trim_trailing_blank(&parsed.preamble);
    if !preamble.is_empty() {
        sections.push(preamble);
    }
    sections.extend(
        parsed
            .blocks
            .iter()
            .map(|block| trim_trailing_blank(&block.lines)),
    );

    let newline = parsed.line_ending.as_str();
    let mut out = String::new();
    for (index, section) in sections.iter().enumerate() {
        if index > 0 {
            out.push_str(newline);
        }
        for line in section.iter() {
            out.push_str(line);
            out.push_str(newline);
        }
    }
    out
}

/// Order blocks by [`NodeOrderKey`]. Blocks with identical patterns keep
/// their relative order.
pub fn sort_blocks(mut blocks: Vec<HostBlock>) -> Vec<HostBlock> {
    blocks.sort_by_cached_key(|block| NodeOrderKey::for_pattern(&block.pattern));
    blocks
}

/// Insert or update the block for `pattern`, then re-sort and render.
///
/// An existing block keeps every line except the `HostName`, `User` and
/// `ProxyJump` directives, which are rewritten in place (or appended after
/// the last directive when missing). Only the first block with exactly
/// `pattern` is touched.
pub fn merge_host(config: &str, pattern: &str, fields: &HostFields) -> String {
    let ParsedConfig {
        preamble,
        blocks,
        line_ending,
    } = parse_config(config);
    let blocks = sort_blocks(upsert_host(blocks, pattern, fields));
    render_config(&ParsedConfig {
        preamble,
        blocks,
        line_ending,
    })
}

/// `User` of the gateway block, if the block exists and the value is non-empty.
pub fn gateway_user(config: &str, gateway: &str) -> Option<String> {
    parse_config(config)
        .blocks
        .iter()
        .find(|block| block.pattern == gateway)?
        .directive("User")
        .filter(|user| !user.is_empty())
        .map(str::to_string)
}

/// Write the block for a compute node, reached through `gateway` unless the
/// caller is already inside the facility network.
pub fn configure_node(
    config: &str,
    node: &str,
    gateway: &str,
    location: NetworkLocation,
) -> MergeOutcome {
    let credential = gateway_user(config, gateway);
    let needs_gateway_setup = credential.is_none();
    if needs_gateway_setup {
        debug!(
            "No User found for gateway '{}', writing '{}' with an empty user",
            gateway, node
        );
    }

    let proxy_jump = match location {
        NetworkLocation::Outside => JumpPolicy::Via(gateway.to_string()),
        NetworkLocation::Inside => JumpPolicy::Direct,
    };
    let fields = HostFields {
        hostname: node.to_string(),
        user: credential.unwrap_or_default(),
        proxy_jump,
    };

    MergeOutcome {
        config: merge_host(config, node, &fields),
        needs_gateway_setup,
    }
}

/// Write the gateway block with the given username. A `ProxyJump` the user
/// added to the gateway is left alone.
pub fn configure_gateway(config: &str, gateway: &str, hostname: &str, username: &str) -> String {
    let fields = HostFields {
        hostname: hostname.to_string(),
        user: username.to_string(),
        proxy_jump: JumpPolicy::Unmanaged,
    };
    merge_host(config, gateway, &fields)
}

fn upsert_host(mut blocks: Vec<HostBlock>, pattern: &str, fields: &HostFields) -> Vec<HostBlock> {
    match blocks.iter().position(|block| block.pattern == pattern) {
        Some(index) => {
            debug!("Updating existing block for '{}'", pattern);
            blocks[index] = blocks[index].with_fields(fields);
        }
        None => {
            debug!("Adding new block for '{}'", pattern);
            blocks.push(HostBlock::synthesize(pattern, fields));
        }
    }
    blocks
}

/// Split a directive line into keyword and value. Accepts both
/// `Keyword value` and `Keyword=value`. Blank and comment lines yield `None`.
fn split_directive(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    match trimmed.find(|c: char| c.is_whitespace() || c == '=') {
        Some(end) => {
            let rest = trimmed[end..].trim_start();
            let rest = rest.strip_prefix('=').unwrap_or(rest).trim_start();
            Some((&trimmed[..end], rest))
        }
        None => Some((trimmed, "")),
    }
}

/// Pattern of a `Host` line; `None` for any other line.
fn host_pattern(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let (keyword, value) = split_directive(trimmed)?;
    if keyword.eq_ignore_ascii_case("host") && trimmed.len() > keyword.len() {
        Some(value)
    } else {
        None
    }
}

fn format_directive(indent: &str, keyword: &str, value: &str) -> String {
    format!("{}{} {}", indent, keyword, value)
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Rewrite, insert or (with `None`) remove the `keyword` directive of a
/// block. The first occurrence is rewritten and any later duplicates are
/// dropped. Index 0 is the `Host` line and is never touched.
fn set_directive(lines: &mut Vec<String>, keyword: &str, value: Option<&str>) {
    let matches: Vec<usize> = lines
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| {
            split_directive(line).is_some_and(|(name, _)| name.eq_ignore_ascii_case(keyword))
        })
        .map(|(index, _)| index)
        .collect();

    match (matches.split_first(), value) {
        (Some((&first, duplicates)), Some(value)) => {
            for &index in duplicates.iter().rev() {
                lines.remove(index);
            }
            let indent = leading_whitespace(&lines[first]).to_string();
            lines[first] = format_directive(&indent, keyword, value);
        }
        (Some(_), None) => {
            for &index in matches.iter().rev() {
                lines.remove(index);
            }
        }
        (None, Some(value)) => {
            let last = lines
                .iter()
                .rposition(|line| split_directive(line).is_some())
                .unwrap_or(0);
            let indent = if last == 0 {
                DIRECTIVE_INDENT.to_string()
            } else {
                leading_whitespace(&lines[last]).to_string()
            };
            lines.insert(last + 1, format_directive(&indent, keyword, value));
        }
        (None, None) => {}
    }
}

fn trim_trailing_blank(lines: &[String]) -> &[String] {
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(0, |index| index + 1);
    &lines[..end]
}
