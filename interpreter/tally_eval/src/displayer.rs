//! Output channels for results, messages and errors.
//!
//! Sessions direct their output through one of these so the REPL,
//! scripted runs and tests share the evaluation path:
//! - Console: results to stdout, errors to stderr
//! - Buffer: captured for assertions
//!
//! Enum dispatch instead of trait objects keeps this hot path free of
//! vtable indirection.

use parking_lot::Mutex;

/// Which stream a free-form message belongs on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    Output,
    Error,
}

/// Writes results to stdout and errors to stderr.
#[derive(Default)]
pub struct ConsoleDisplayer;

impl ConsoleDisplayer {
    /// An expression result, already rendered.
    pub fn result(&self, source: &str, rendered: &str) {
        println!("{source} -> {rendered}");
    }

    /// A statement acknowledgment, such as a mode change.
    pub fn action(&self, msg: &str) {
        println!("{msg}");
    }

    pub fn message(&self, channel: Channel, msg: &str) {
        match channel {
            Channel::Output => println!("{msg}"),
            Channel::Error => eprintln!("{msg}"),
        }
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{msg}");
    }

    pub fn timing(&self, label: &str, seconds: f64) {
        eprintln!("{label}: {seconds:.9} secs");
    }
}

/// Captures everything for later assertions.
pub struct BufferDisplayer {
    output: Mutex<String>,
    errors: Mutex<String>,
}

impl BufferDisplayer {
    pub fn new() -> Self {
        BufferDisplayer {
            output: Mutex::new(String::new()),
            errors: Mutex::new(String::new()),
        }
    }

    fn push_line(buf: &Mutex<String>, msg: &str) {
        let mut guard = buf.lock();
        guard.push_str(msg);
        guard.push('\n');
    }

    pub fn result(&self, source: &str, rendered: &str) {
        Self::push_line(&self.output, &format!("{source} -> {rendered}"));
    }

    pub fn action(&self, msg: &str) {
        Self::push_line(&self.output, msg);
    }

    pub fn message(&self, channel: Channel, msg: &str) {
        match channel {
            Channel::Output => Self::push_line(&self.output, msg),
            Channel::Error => Self::push_line(&self.errors, msg),
        }
    }

    pub fn error(&self, msg: &str) {
        Self::push_line(&self.errors, msg);
    }

    pub fn timing(&self, label: &str, seconds: f64) {
        Self::push_line(&self.errors, &format!("{label}: {seconds:.9} secs"));
    }

    pub fn output(&self) -> String {
        self.output.lock().clone()
    }

    pub fn errors(&self) -> String {
        self.errors.lock().clone()
    }

    pub fn clear(&self) {
        self.output.lock().clear();
        self.errors.lock().clear();
    }
}

impl Default for BufferDisplayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Displayer implementation using enum dispatch.
pub enum Displayer {
    Console(ConsoleDisplayer),
    Buffer(BufferDisplayer),
    /// Discards all output (quiet sub-evaluations).
    Silent,
}

impl Displayer {
    pub fn console() -> Self {
        Displayer::Console(ConsoleDisplayer)
    }

    pub fn buffer() -> Self {
        Displayer::Buffer(BufferDisplayer::new())
    }

    pub fn result(&self, source: &str, rendered: &str) {
        match self {
            Displayer::Console(d) => d.result(source, rendered),
            Displayer::Buffer(d) => d.result(source, rendered),
            Displayer::Silent => {}
        }
    }

    pub fn action(&self, msg: &str) {
        match self {
            Displayer::Console(d) => d.action(msg),
            Displayer::Buffer(d) => d.action(msg),
            Displayer::Silent => {}
        }
    }

    pub fn message(&self, channel: Channel, msg: &str) {
        match self {
            Displayer::Console(d) => d.message(channel, msg),
            Displayer::Buffer(d) => d.message(channel, msg),
            Displayer::Silent => {}
        }
    }

    pub fn error(&self, msg: &str) {
        match self {
            Displayer::Console(d) => d.error(msg),
            Displayer::Buffer(d) => d.error(msg),
            Displayer::Silent => {}
        }
    }

    pub fn timing(&self, label: &str, seconds: f64) {
        match self {
            Displayer::Console(d) => d.timing(label, seconds),
            Displayer::Buffer(d) => d.timing(label, seconds),
            Displayer::Silent => {}
        }
    }

    /// Captured output, for the buffer variant.
    pub fn captured_output(&self) -> String {
        match self {
            Displayer::Buffer(d) => d.output(),
            _ => String::new(),
        }
    }

    pub fn captured_errors(&self) -> String {
        match self {
            Displayer::Buffer(d) => d.errors(),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn buffer_separates_channels() {
        let d = Displayer::buffer();
        d.result("1 + 1", "2");
        d.message(Channel::Error, "oops");
        assert_eq!(d.captured_output(), "1 + 1 -> 2\n");
        assert_eq!(d.captured_errors(), "oops\n");
    }

    #[test]
    fn silent_discards() {
        let d = Displayer::Silent;
        d.action("ignored");
        assert_eq!(d.captured_output(), "");
    }
}
