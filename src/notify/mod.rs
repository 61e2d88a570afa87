//! User-facing notifications
//!
//! Lifecycle progress is reported through a `Notifier` writing tagged
//! messages to a caller-provided writer. The notifier is the only place the
//! core emits user-facing text; diagnostics go through `tracing` instead.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Message classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Title,
    Activity,
    Success,
    Warning,
    Error,
    Info,
}

/// A single tagged notification
#[derive(Debug, Clone)]
pub struct Message {
    pub message_type: MessageType,
    pub content: String,
    pub emoji: Option<String>,
    pub timing: Option<Duration>,
}

impl Message {
    pub fn new(message_type: MessageType, content: impl Into<String>) -> Self {
        Self {
            message_type,
            content: content.into(),
            emoji: None,
            timing: None,
        }
    }

    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }

    pub fn with_timing(mut self, timing: Duration) -> Self {
        self.timing = Some(timing);
        self
    }
}

/// Notification sink over a shared writer.
///
/// Clones share the writer; messages are serialized through a mutex so a
/// single command invocation emits them in program order.
#[derive(Clone)]
pub struct Notifier {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Notifier {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Notifier over stdout
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// Notifier over an in-memory buffer, plus a handle to read it back
    #[allow(dead_code)]
    pub fn buffered() -> (Self, BufferHandle) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let handle = BufferHandle(buffer.clone());
        (Self::new(SharedBuffer(buffer)), handle)
    }

    pub fn notify(&self, message: Message) {
        let line = render(&message);
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{line}");
            let _ = writer.flush();
        }
    }

    pub fn title(&self, emoji: &str, content: impl Into<String>) {
        self.notify(Message::new(MessageType::Title, content).with_emoji(emoji));
    }

    pub fn activity(&self, content: impl Into<String>) {
        self.notify(Message::new(MessageType::Activity, content));
    }

    pub fn success(&self, content: impl Into<String>) {
        self.notify(Message::new(MessageType::Success, content));
    }

    pub fn warning(&self, content: impl Into<String>) {
        self.notify(Message::new(MessageType::Warning, content));
    }

    pub fn error(&self, content: impl Into<String>) {
        self.notify(Message::new(MessageType::Error, content));
    }

    pub fn info(&self, content: impl Into<String>) {
        self.notify(Message::new(MessageType::Info, content));
    }
}

fn render(message: &Message) -> String {
    let mut line = match message.message_type {
        MessageType::Title => String::new(),
        MessageType::Activity => "► ".to_string(),
        MessageType::Success => "✔ ".to_string(),
        MessageType::Warning => "⚠ ".to_string(),
        MessageType::Error => "✗ ".to_string(),
        MessageType::Info => "ℹ ".to_string(),
    };

    if let Some(emoji) = &message.emoji {
        line.push_str(emoji);
        line.push(' ');
    }
    line.push_str(&message.content);

    if let Some(timing) = message.timing {
        line.push_str(&format!(" ({})", format_elapsed(timing)));
    }

    line
}

/// Compact elapsed-time rendering ("350ms", "2.5s", "1m12s")
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else {
        let secs = elapsed.as_secs();
        format!("{}m{}s", secs / 60, secs % 60)
    }
}

/// Read handle for buffered notifiers (tests and captured output)
pub struct BufferHandle(Arc<Mutex<Vec<u8>>>);

impl BufferHandle {
    #[allow(dead_code)]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("buffer poisoned")).into_owned()
    }
}

struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("buffer poisoned").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_render_in_program_order() {
        let (notifier, buffer) = Notifier::buffered();
        notifier.title("⛵", "Creating cluster");
        notifier.activity("creating cluster 'demo'...");
        notifier.success("cluster created");

        let output = buffer.contents();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "⛵ Creating cluster");
        assert_eq!(lines[1], "► creating cluster 'demo'...");
        assert_eq!(lines[2], "✔ cluster created");
    }

    #[test]
    fn test_timing_is_appended() {
        let (notifier, buffer) = Notifier::buffered();
        notifier.notify(
            Message::new(MessageType::Success, "done").with_timing(Duration::from_millis(350)),
        );
        assert!(buffer.contents().contains("done (350ms)"));
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(42)), "42ms");
        assert_eq!(format_elapsed(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_elapsed(Duration::from_secs(72)), "1m12s");
    }
}
