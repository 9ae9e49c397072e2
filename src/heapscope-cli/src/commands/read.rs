//! Raw memory read command handler

use anyhow::{Context, Result};
use heapscope::Session;

/// Handle the Read command
///
/// Reads bytes from the image and displays them as a hex dump.
pub fn handle(session: &Session, address: u64, size: usize, json: bool) -> Result<()> {
    let data = session
        .view()
        .read_bytes(address, size)
        .with_context(|| format!("Failed to read {} bytes at {:#x}", size, address))?;

    if json {
        return super::print_json(&data);
    }

    println!("Reading {} bytes at {:#x}:", size, address);
    for line in hex_dump(address, &data) {
        println!("{}", line);
    }
    Ok(())
}

/// Format `data` as 16-byte hex dump lines with an ASCII column
pub fn hex_dump(address: u64, data: &[u8]) -> Vec<String> {
    data.chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let mut line = format!("{:016x}  ", address + i as u64 * 16);
            for j in 0..16 {
                match chunk.get(j) {
                    Some(byte) => line.push_str(&format!("{:02x} ", byte)),
                    None => line.push_str("   "),
                }
                if j == 7 {
                    line.push(' ');
                }
            }
            line.push_str(" |");
            line.extend(chunk.iter().map(|&byte| {
                let c = byte as char;
                if c.is_ascii_graphic() || c == ' ' {
                    c
                } else {
                    '.'
                }
            }));
            line.push('|');
            line
        })
        .collect()
}
