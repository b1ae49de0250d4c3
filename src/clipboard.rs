//! System clipboard access for the command line
//!
//! Uses arboard. The command line is a single line, so pasted text is cut at
//! the first line break.

use anyhow::{Context, Result};
use arboard::Clipboard;

/// Copy the command line text to the system clipboard
pub fn copy(text: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }

    let mut clipboard = Clipboard::new().context("Failed to open clipboard")?;
    clipboard
        .set_text(text.to_string())
        .context("Failed to write clipboard")?;
    tracing::debug!("Copied {} bytes to clipboard", text.len());
    Ok(())
}

/// First line of the clipboard text
pub fn paste() -> Result<String> {
    let mut clipboard = Clipboard::new().context("Failed to open clipboard")?;
    let text = clipboard.get_text().context("Failed to read clipboard")?;
    tracing::debug!("Pasted {} bytes from clipboard", text.len());
    Ok(first_line(&text).to_string())
}

fn first_line(text: &str) -> &str {
    text.split(['\r', '\n']).next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires clipboard access, may fail in CI
    fn test_copy_paste() {
        copy("say hello").expect("Copy failed");
        assert_eq!(paste().expect("Paste failed"), "say hello");
    }

    #[test]
    fn test_empty_copy() {
        assert!(copy("").is_ok());
    }

    #[test]
    fn test_first_line_stops_at_break() {
        assert_eq!(first_line("echo a\r\necho b"), "echo a");
        assert_eq!(first_line(""), "");
    }
}
