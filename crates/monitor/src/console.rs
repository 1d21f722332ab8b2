//! Console input: quit key and typed voice commands

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

const QUIT_WORDS: &[&str] = &["q", "quit", "exit"];

/// Route console lines until quit or end of input.
///
/// Quit words set `quit`; any other line is forwarded as an utterance.
pub fn pump<R: BufRead>(reader: R, utterances: Option<&mpsc::Sender<String>>, quit: &AtomicBool) {
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if QUIT_WORDS.contains(&line.to_ascii_lowercase().as_str()) {
            info!("Quit requested from console");
            quit.store(true, Ordering::SeqCst);
            return;
        }
        match utterances {
            Some(tx) => {
                if tx.send(line.to_string()).is_err() {
                    debug!("Voice input closed");
                }
            }
            None => debug!("Ignoring console input {:?}", line),
        }
    }
    debug!("Console input ended");
}

/// Read stdin on a background thread.
///
/// The thread is detached: a blocked stdin read cannot be interrupted.
pub fn spawn(utterances: Option<mpsc::Sender<String>>, quit: Arc<AtomicBool>) -> std::io::Result<()> {
    thread::Builder::new().name("console".into()).spawn(move || {
        let stdin = std::io::stdin();
        pump(stdin.lock(), utterances.as_ref(), &quit);
    })?;
    info!("Type 'q' to quit; other lines count as spoken commands while the alarm sounds");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_forwards_lines_until_quit() {
        let (tx, rx) = mpsc::channel();
        let quit = AtomicBool::new(false);
        let input = Cursor::new("hello\n\n  stop the alarm \nQ\nnever sent\n");

        pump(input, Some(&tx), &quit);

        assert!(quit.load(Ordering::SeqCst));
        let lines: Vec<String> = rx.try_iter().collect();
        assert_eq!(lines, vec!["hello", "stop the alarm"]);
    }

    #[test]
    fn test_end_of_input_does_not_quit() {
        let quit = AtomicBool::new(false);
        pump(Cursor::new("stop\n"), None, &quit);
        assert!(!quit.load(Ordering::SeqCst));
    }
}
