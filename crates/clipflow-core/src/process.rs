//! Cross-platform process spawning helpers.
//!
//! On Windows, spawning console binaries (the transcoder, the composition
//! renderer) from a background service can cause a console window to appear
//! for each invocation. This module centralizes the Windows creation flags
//! needed to suppress that.

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Apply platform-specific flags to a tokio process command.
pub fn configure_tokio_command(cmd: &mut tokio::process::Command) {
    #[cfg(target_os = "windows")]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}
