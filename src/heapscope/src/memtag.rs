//! Native allocation tag checks
//!
//! ```text
//! [ header tag ][ user data .... ][ 0xDD padding ][ footer tag ]
//!               ^ user pointer    ^ + allocSize   ^ + roundUp(allocSize, 8)
//! ```
//!
//! Header and footer checksum to zero when every u32 word of the tag is
//! XORed with the folded tag address.

use crate::error::{DecodeError, Result};
use crate::layout::*;
use crate::profile::PointerWidth;
use crate::session::Session;
use serde::Serialize;
use tracing::{debug, trace};

/// What the caller believes the block to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockState {
    Allocated,
    Freed,
}

impl BlockState {
    fn header_eyecatcher(self) -> u32 {
        match self {
            BlockState::Allocated => TAG_ALLOC_HEADER,
            BlockState::Freed => TAG_FREED_HEADER,
        }
    }

    fn footer_eyecatcher(self) -> u32 {
        match self {
            BlockState::Allocated => TAG_ALLOC_FOOTER,
            BlockState::Freed => TAG_FREED_FOOTER,
        }
    }
}

/// Outcome of validating one block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagVerdict {
    NotATag,
    HeaderCorrupted,
    FooterCorrupted,
    PaddingCorrupted,
    Valid,
}

/// Decoded header or footer tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryTag {
    pub address: u64,
    pub eyecatcher: u32,
    pub sum_check: u32,
    pub alloc_size: u64,
    pub call_site: u64,
    pub memory_pool_segment: u64,
    /// Whether every word of the tag XORs with its address to zero
    pub checksum_valid: bool,
}

/// A tagged block found by [`TagChecker::scan`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagBlock {
    pub header: u64,
    pub user: u64,
    pub state: BlockState,
    pub alloc_size: u64,
    /// Call-site string the allocator recorded, when it is readable
    pub call_site: Option<String>,
    pub verdict: TagVerdict,
}

const MAX_CALL_SITE_LEN: usize = 256;
const SCAN_CHUNK: u64 = 0x1_0000;

#[derive(Clone, Copy)]
pub struct TagChecker<'s> {
    session: &'s Session,
}

impl<'s> TagChecker<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// Bytes occupied by one tag on this profile
    pub fn tag_size(&self) -> u64 {
        match self.session.profile().abi.pointer_width {
            PointerWidth::Bits64 => TAG_SIZE_64,
            PointerWidth::Bits32 => TAG_SIZE_32,
        }
    }

    /// Read and checksum the tag at `address`
    pub fn read_tag(&self, address: u64) -> Result<MemoryTag> {
        let session = self.session;
        let bytes = session.read_bytes(address, self.tag_size() as usize)?;
        let endian = session.view().endian();
        let pointer = session.pointer_size() as usize;
        let word = |offset: usize, width: usize| endian.read_uint(&bytes[offset..offset + width]);

        let folded = match session.profile().abi.pointer_width {
            PointerWidth::Bits64 => ((address >> 32) as u32) ^ (address as u32),
            PointerWidth::Bits32 => address as u32,
        };
        let sum = bytes
            .chunks_exact(4)
            .fold(folded, |sum, chunk| sum ^ endian.read_uint(chunk) as u32);

        Ok(MemoryTag {
            address,
            eyecatcher: word(0, 4) as u32,
            sum_check: word(4, 4) as u32,
            alloc_size: word(8, pointer),
            call_site: word(8 + pointer, pointer),
            memory_pool_segment: word(8 + 2 * pointer, pointer),
            checksum_valid: sum == 0,
        })
    }

    /// Address of the footer for a block with `alloc_size` user bytes
    pub fn footer_address(&self, user: u64, alloc_size: u64) -> Result<u64> {
        alloc_size
            .checked_next_multiple_of(TAG_ROUNDING)
            .and_then(|rounded| user.checked_add(rounded))
            .ok_or_else(|| {
                DecodeError::corrupt("memory tag alloc size", user, "block inside the address space", alloc_size)
            })
    }

    /// Validate the block whose user data starts at `user`
    ///
    /// Header faults are always errors. For a freed block the footer and
    /// padding may already be reused, so faults there become verdicts.
    pub fn check(&self, user: u64, state: BlockState) -> Result<TagVerdict> {
        let header_at = user.checked_sub(self.tag_size()).ok_or_else(|| {
            DecodeError::corrupt("memory tag", user, "room for a header tag", "user pointer below tag size")
        })?;

        let header = self.read_tag(header_at)?;
        if header.eyecatcher != state.header_eyecatcher() {
            return Ok(TagVerdict::NotATag);
        }
        if !header.checksum_valid {
            return Ok(TagVerdict::HeaderCorrupted);
        }

        let Ok(footer_at) = self.footer_address(user, header.alloc_size) else {
            return Ok(TagVerdict::HeaderCorrupted);
        };
        let footer = match self.read_tag(footer_at) {
            Ok(footer) => footer,
            Err(DecodeError::Fault(_)) if state == BlockState::Freed => {
                return Ok(TagVerdict::FooterCorrupted)
            }
            Err(err) => return Err(err),
        };
        if footer.eyecatcher != state.footer_eyecatcher()
            || !footer.checksum_valid
            || footer.alloc_size != header.alloc_size
        {
            return Ok(TagVerdict::FooterCorrupted);
        }

        let padding_at = user + header.alloc_size;
        let padding = match self
            .session
            .read_bytes(padding_at, (footer_at - padding_at) as usize)
        {
            Ok(padding) => padding,
            Err(DecodeError::Fault(_)) if state == BlockState::Freed => {
                return Ok(TagVerdict::PaddingCorrupted)
            }
            Err(err) => return Err(err),
        };
        if padding.iter().any(|&byte| byte != TAG_PADDING_BYTE) {
            return Ok(TagVerdict::PaddingCorrupted);
        }

        Ok(TagVerdict::Valid)
    }

    /// Find every header tag in `[start, end)` whose checksum holds
    ///
    /// Unmapped parts of the range are skipped.
    pub fn scan(&self, start: u64, end: u64) -> Result<Vec<TagBlock>> {
        let session = self.session;
        let endian = session.view().endian();
        let tag_size = self.tag_size();
        let mut blocks = Vec::new();

        let mut chunk_start = start.next_multiple_of(TAG_ROUNDING);
        while chunk_start < end {
            let chunk_end = chunk_start.saturating_add(SCAN_CHUNK).min(end);
            let bytes = match session.read_bytes(chunk_start, (chunk_end - chunk_start) as usize) {
                Ok(bytes) => bytes,
                Err(DecodeError::Fault(fault)) => {
                    trace!(%fault, "tag scan skipped unreadable chunk");
                    chunk_start = chunk_end;
                    continue;
                }
                Err(err) => return Err(err),
            };

            for offset in (0..bytes.len().saturating_sub(3)).step_by(TAG_ROUNDING as usize) {
                let eyecatcher = endian.read_uint(&bytes[offset..offset + 4]) as u32;
                let state = match eyecatcher {
                    TAG_ALLOC_HEADER => BlockState::Allocated,
                    TAG_FREED_HEADER => BlockState::Freed,
                    _ => continue,
                };
                let header_at = chunk_start + offset as u64;
                let Ok(header) = self.read_tag(header_at) else {
                    continue;
                };
                if !header.checksum_valid {
                    continue;
                }

                let user = header_at + tag_size;
                let verdict = match self.check(user, state) {
                    Ok(verdict) => verdict,
                    Err(err) if err.is_data_error() => TagVerdict::FooterCorrupted,
                    Err(err) => return Err(err),
                };
                blocks.push(TagBlock {
                    header: header_at,
                    user,
                    state,
                    alloc_size: header.alloc_size,
                    call_site: self.call_site(header.call_site),
                    verdict,
                });
            }
            chunk_start = chunk_end;
        }

        debug!(
            start = format_args!("{start:#x}"),
            end = format_args!("{end:#x}"),
            found = blocks.len(),
            "tag scan finished"
        );
        Ok(blocks)
    }

    fn call_site(&self, address: u64) -> Option<String> {
        if address == 0 {
            return None;
        }
        self.session
            .view()
            .read_cstring(address, MAX_CALL_SITE_LEN)
            .ok()
            .filter(|site| !site.is_empty())
    }
}
