//! Parsing of caller-supplied volume creation options.

use std::collections::HashMap;

use crate::volume::VolumeOptions;

/// Option naming the backing share. Required.
pub const OPTION_SHARE: &str = "share";
/// Option overriding file permission bits (octal).
pub const OPTION_FILE_MODE: &str = "file_mode";
/// Option overriding directory permission bits (octal).
pub const OPTION_DIR_MODE: &str = "dir_mode";
/// Option setting the owning user id.
pub const OPTION_UID: &str = "uid";
/// Option setting the owning group id.
pub const OPTION_GID: &str = "gid";

const KNOWN_OPTIONS: [&str; 5] = [OPTION_SHARE, OPTION_FILE_MODE, OPTION_DIR_MODE, OPTION_UID, OPTION_GID];
const MAX_MODE: u32 = 0o7777;

pub(super) fn parse(options: &HashMap<String, String>) -> Result<VolumeOptions, String> {
    let mut unknown = options
        .keys()
        .filter(|key| !KNOWN_OPTIONS.contains(&key.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    if !unknown.is_empty() {
        unknown.sort();
        return Err(format!("unrecognised volume options: {}", unknown.join(", ")));
    }

    let share = options
        .get(OPTION_SHARE)
        .map(|value| value.trim())
        .unwrap_or_default();
    if share.is_empty() {
        return Err(format!("missing volume option: '{OPTION_SHARE}'"));
    }

    let mut parsed = VolumeOptions::for_share(share);
    if let Some(raw) = options.get(OPTION_FILE_MODE) {
        parsed.file_mode = parse_mode(OPTION_FILE_MODE, raw)?;
    }
    if let Some(raw) = options.get(OPTION_DIR_MODE) {
        parsed.dir_mode = parse_mode(OPTION_DIR_MODE, raw)?;
    }
    if let Some(raw) = options.get(OPTION_UID) {
        parsed.uid = Some(parse_id(OPTION_UID, raw)?);
    }
    if let Some(raw) = options.get(OPTION_GID) {
        parsed.gid = Some(parse_id(OPTION_GID, raw)?);
    }
    Ok(parsed)
}

fn parse_mode(key: &str, raw: &str) -> Result<u32, String> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0o")
        .unwrap_or(trimmed);
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if mode <= MAX_MODE => Ok(mode),
        _ => Err(format!("volume option '{key}' must be an octal mode up to 7777, got '{raw}'")),
    }
}

fn parse_id(key: &str, raw: &str) -> Result<u32, String> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| format!("volume option '{key}' must be a non-negative integer, got '{raw}'"))
}
