//! Printing cumulative snapshots to a terminal.

use std::io::Write;

use glimpse_chat::{ActiveStream, StreamId, Subscription};

/// The part of `snapshot` not yet on screen, or `None` when the snapshot no
/// longer extends what was shown and the answer must be redrawn.
pub fn unseen_suffix<'a>(shown: &str, snapshot: &'a str) -> Option<&'a str> {
    snapshot.strip_prefix(shown)
}

/// Print the stream `id` until its terminal event. Returns the final view.
pub async fn print_answer(
    sub: &mut Subscription,
    id: StreamId,
    prefix: &str,
) -> std::io::Result<ActiveStream> {
    let mut view = ActiveStream::new();
    view.track(id);
    let mut shown = String::new();
    let mut out = std::io::stdout();

    write!(out, "{prefix}")?;
    while let Some(event) = sub.recv().await {
        if !view.apply(&event) {
            continue;
        }

        if event.error {
            writeln!(out)?;
            eprintln!("  [Error] {}", event.text);
            break;
        }

        match unseen_suffix(&shown, view.text()) {
            Some(suffix) => write!(out, "{suffix}")?,
            None => write!(out, "\n{prefix}{}", view.text())?,
        }
        out.flush()?;
        shown = view.text().to_string();

        if view.is_done() {
            writeln!(out)?;
            break;
        }
    }

    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growing_snapshot_prints_only_the_tail() {
        assert_eq!(unseen_suffix("Hel", "Hello"), Some("lo"));
        assert_eq!(unseen_suffix("", "Hi"), Some("Hi"));
        assert_eq!(unseen_suffix("Hello", "Hello"), Some(""));
    }

    #[test]
    fn rewritten_snapshot_needs_redraw() {
        assert_eq!(unseen_suffix("Hello wor", "Hello, world"), None);
    }
}
