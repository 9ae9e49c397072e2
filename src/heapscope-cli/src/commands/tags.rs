//! Memory tag command handlers

use anyhow::{Context, Result};
use heapscope::{BlockState, MemoryTag, Session, TagBlock, TagVerdict};
use serde::Serialize;

#[derive(Serialize)]
struct CheckReport {
    user: u64,
    state: BlockState,
    verdict: TagVerdict,
    header: MemoryTag,
}

/// Handle the Tags Check command
pub fn handle_check(session: &Session, address: u64, freed: bool, json: bool) -> Result<()> {
    let tags = session.tags();
    let state = if freed {
        BlockState::Freed
    } else {
        BlockState::Allocated
    };

    let verdict = tags
        .check(address, state)
        .with_context(|| format!("Failed to check tagged block at {:#x}", address))?;
    let header = tags.read_tag(address - tags.tag_size())?;

    if json {
        return super::print_json(&CheckReport {
            user: address,
            state,
            verdict,
            header,
        });
    }

    println!("Block {:#x} ({:?}): {}", address, state, verdict_label(verdict));
    println!("  Header tag:  {:#x}", header.address);
    println!("  Eyecatcher:  {:#010x}", header.eyecatcher);
    println!("  Checksum:    {}", if header.checksum_valid { "ok" } else { "bad" });
    println!("  Alloc size:  {} bytes", header.alloc_size);
    println!("  Call site:   {:#x}", header.call_site);
    Ok(())
}

/// Handle the Tags Scan command
pub fn handle_scan(
    session: &Session,
    start: u64,
    end: u64,
    corrupt_only: bool,
    json: bool,
) -> Result<()> {
    let blocks: Vec<TagBlock> = session
        .tags()
        .scan(start, end)
        .with_context(|| format!("Failed to scan {:#x}..{:#x}", start, end))?
        .into_iter()
        .filter(|block| !corrupt_only || block.verdict != TagVerdict::Valid)
        .collect();

    if json {
        return super::print_json(&blocks);
    }

    for block in &blocks {
        println!(
            "{:#014x} {:>10} {:>10} bytes  {:<18} {}",
            block.user,
            format!("{:?}", block.state),
            block.alloc_size,
            verdict_label(block.verdict),
            block.call_site.as_deref().unwrap_or("-")
        );
    }
    println!("{} blocks", blocks.len());
    Ok(())
}

fn verdict_label(verdict: TagVerdict) -> &'static str {
    match verdict {
        TagVerdict::NotATag => "not a tag",
        TagVerdict::HeaderCorrupted => "header corrupted",
        TagVerdict::FooterCorrupted => "footer corrupted",
        TagVerdict::PaddingCorrupted => "padding corrupted",
        TagVerdict::Valid => "valid",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;

    #[test]
    fn test_untagged_block() {
        let session = test_support::session(vec![0u8; 256], 0x1000);
        assert!(handle_check(&session, 0x1020, false, false).is_ok());
        assert!(handle_check(&session, 0x1020, true, true).is_ok());
    }

    #[test]
    fn test_header_outside_image() {
        let session = test_support::session(vec![0u8; 256], 0x1000);
        assert!(handle_check(&session, 0x1000, false, false).is_err());
    }

    #[test]
    fn test_scan_empty_range() {
        let session = test_support::session(vec![0u8; 256], 0x1000);
        assert!(handle_scan(&session, 0x1000, 0x1100, true, false).is_ok());
        assert!(handle_scan(&session, 0x1000, 0x1100, false, true).is_ok());
    }

    #[test]
    fn test_verdict_labels() {
        assert_eq!(verdict_label(TagVerdict::Valid), "valid");
        assert_eq!(verdict_label(TagVerdict::NotATag), "not a tag");
    }
}
