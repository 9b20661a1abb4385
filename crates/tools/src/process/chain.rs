//! `&&` chain splitting.
//!
//! A plain textual split: quoting is not understood, so an `&&` inside a
//! quoted argument also splits. Commands without `&&` pass through whole.

/// Split `command` on `&&` into trimmed, non-empty sub-commands.
pub fn split_chain(command: &str) -> Vec<&str> {
    if !command.contains("&&") {
        return vec![command];
    }
    command
        .split("&&")
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_command_is_untouched() {
        assert_eq!(split_chain("npm install"), vec!["npm install"]);
        assert_eq!(split_chain("echo a & b"), vec!["echo a & b"]);
    }

    #[test]
    fn splits_in_order_and_trims() {
        assert_eq!(
            split_chain("cd web &&npm install&&  npm run build"),
            vec!["cd web", "npm install", "npm run build"]
        );
    }

    #[test]
    fn empty_segments_are_dropped() {
        assert_eq!(split_chain("a && && b &&"), vec!["a", "b"]);
    }

    #[test]
    fn quoted_and_and_still_splits() {
        assert_eq!(split_chain("echo 'x && y'"), vec!["echo 'x", "y'"]);
    }
}
