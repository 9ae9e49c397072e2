//! Profile command handler

use anyhow::Result;
use heapscope::{Session, SessionProfile};

/// Handle the Profile command
pub fn handle(session: &Session, json: bool) -> Result<()> {
    let profile = session.profile();
    if json {
        return super::print_json(profile);
    }

    for line in describe(profile) {
        println!("{}", line);
    }
    Ok(())
}

/// Human-readable summary of a profile
pub fn describe(profile: &SessionProfile) -> Vec<String> {
    let abi = &profile.abi;
    let constants = &profile.constants;
    let capabilities = &profile.capabilities;
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };

    let mut lines = vec![
        "ABI:".to_string(),
        format!("  Pointer size:          {} bytes", abi.pointer_size()),
        format!("  Reference size:        {} bytes", abi.reference_size()),
        format!("  Compressed references: {}", yes_no(abi.compressed_references)),
        format!("  Mixed reference mode:  {}", yes_no(abi.mixed_reference_mode)),
        format!("  Array data address:    {}", yes_no(abi.data_address_present)),
        String::new(),
        "Constants:".to_string(),
        format!("  Arraylet leaf size:    {} bytes", constants.arraylet_leaf_size),
        format!("  Compressed shift:      {}", constants.compressed_shift),
    ];
    match constants.hidden_fields {
        Some(head) => lines.push(format!("  Hidden fields:         {:#x}", head)),
        None => lines.push("  Hidden fields:         none".to_string()),
    }

    lines.push(String::new());
    lines.push("Capabilities:".to_string());
    lines.push(format!("  Flattened fields:      {}", yes_no(capabilities.flattened_fields)));
    lines.push(format!("  JIT vtable:            {}", yes_no(capabilities.jit_vtable)));
    lines.push(format!("  String compression:    {}", yes_no(capabilities.string_compression)));

    lines.push(String::new());
    lines.push(format!("Algorithm versions ({}):", profile.versions.len()));
    let mut versions: Vec<(&str, u32)> = profile.versions.iter().collect();
    versions.sort();
    for (name, value) in versions {
        lines.push(format!("  {:<32} {}", name, value));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;

    #[test]
    fn test_describe_profile() {
        let session = test_support::session(vec![0u8; 16], 0x1000);
        let lines = describe(session.profile());
        assert!(lines.contains(&"  Pointer size:          8 bytes".to_string()));
        assert!(lines.contains(&"  Hidden fields:         none".to_string()));
        assert!(lines.contains(&"Algorithm versions (3):".to_string()));

        let versions: Vec<&String> = lines.iter().skip_while(|l| !l.starts_with("Algorithm")).skip(1).collect();
        assert!(versions[0].trim_start().starts_with("CLASS_DEPTH_VERSION"));
        assert!(versions[2].trim_start().starts_with("STRING_LAYOUT_VERSION"));
    }

    #[test]
    fn test_profile_json() {
        let session = test_support::session(vec![0u8; 16], 0x1000);
        assert!(handle(&session, true).is_ok());
    }
}
