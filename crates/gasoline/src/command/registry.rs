// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static metadata per [`CommandKind`], replacing the dynamic per-command
//! registration table the capture script's original protocol used.

use super::types::CommandKind;

/// Whether a command must resolve to a target tab before it can be queued.
/// `State` reports broker-level state and isn't tab-scoped.
pub fn requires_target_tab(kind: &CommandKind) -> bool {
    !matches!(kind, CommandKind::State)
}

/// Whether a command operates through browser-level APIs (navigation,
/// screenshotting) rather than by injecting a content script into the
/// page. Browser-escape commands still run against pages the
/// content-script policy would otherwise restrict.
pub fn is_browser_escape(kind: &CommandKind) -> bool {
    matches!(
        kind,
        CommandKind::Navigate
            | CommandKind::Reload
            | CommandKind::GoBack
            | CommandKind::GoForward
            | CommandKind::Screenshot
            | CommandKind::State
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_does_not_require_a_target_tab() {
        assert!(!requires_target_tab(&CommandKind::State));
        assert!(requires_target_tab(&CommandKind::Click));
    }

    #[test]
    fn content_script_commands_are_not_browser_escapes() {
        assert!(!is_browser_escape(&CommandKind::Click));
        assert!(!is_browser_escape(&CommandKind::QueryDom));
        assert!(!is_browser_escape(&CommandKind::EvaluateScript));
        assert!(!is_browser_escape(&CommandKind::A11yAudit));
    }

    #[test]
    fn navigation_commands_are_browser_escapes() {
        assert!(is_browser_escape(&CommandKind::Navigate));
        assert!(is_browser_escape(&CommandKind::Reload));
        assert!(is_browser_escape(&CommandKind::GoBack));
        assert!(is_browser_escape(&CommandKind::GoForward));
        assert!(is_browser_escape(&CommandKind::Screenshot));
    }

    #[test]
    fn unknown_command_is_neither_escape_nor_exempt() {
        let other = CommandKind::Other("drag_drop".to_owned());
        assert!(requires_target_tab(&other));
        assert!(!is_browser_escape(&other));
    }
}
