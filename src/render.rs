//! Output rendering for the chat application.
//!
//! Everything the user sees goes through [`Renderer`], which keeps the
//! session logic free of terminal details and lets tests capture output.

use std::io::{self, Stdout, Write};

/// ANSI escape code for bold text (used for streamed responses).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for yellow text (used for values and role labels).
const ANSI_YELLOW: &str = "\x1b[93m";

/// ANSI escape code for grey text (used for notices).
const ANSI_GREY: &str = "\x1b[90m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI sequence that clears the screen and homes the cursor.
const ANSI_CLEAR_SCREEN: &str = "\x1b[2J\x1b[3J\x1b[H";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print a fragment of a streamed response.
    ///
    /// This is called incrementally as fragments arrive and must not buffer.
    fn print_fragment(&mut self, text: &str);

    /// Called when a streamed response is complete or has failed.
    fn finish_response(&mut self);

    /// Print an informational line.
    fn print_info(&mut self, info: &str);

    /// Print a label followed by a highlighted value, e.g. `Current prompt: ...`.
    fn print_value(&mut self, label: &str, value: &str);

    /// Print one message of the conversation as `ROLE: content`.
    fn print_message(&mut self, role: &str, content: &str);

    /// Print one line of the command reference.
    fn print_help_entry(&mut self, command: &str, description: &str) {
        self.print_info(&format!("{command} {description}"));
    }

    /// Print a de-emphasized notice.
    fn print_notice(&mut self, notice: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Clear the terminal.
    fn clear_screen(&mut self);

    /// Called when the user interrupts a streaming response.
    fn print_interrupted(&mut self) {}
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    in_response: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            in_response: false,
        }
    }

    /// Returns true if ANSI styling is enabled.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn highlight(&self, text: &str) -> String {
        if self.use_color {
            format!("{ANSI_YELLOW}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    fn end_response_style(&mut self) {
        if self.in_response {
            if self.use_color {
                print!("{ANSI_RESET}");
            }
            self.in_response = false;
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_fragment(&mut self, text: &str) {
        if self.use_color && !self.in_response {
            print!("{ANSI_BOLD}{ANSI_YELLOW}");
        }
        self.in_response = true;
        print!("{text}");
        self.flush();
    }

    fn finish_response(&mut self) {
        self.end_response_style();
        println!();
        self.flush();
    }

    fn print_info(&mut self, info: &str) {
        self.end_response_style();
        println!("{info}");
    }

    fn print_value(&mut self, label: &str, value: &str) {
        self.end_response_style();
        println!("{label}: {}", self.highlight(value));
    }

    fn print_message(&mut self, role: &str, content: &str) {
        self.end_response_style();
        println!("{} {content}", self.highlight(&format!("{role}:")));
    }

    fn print_help_entry(&mut self, command: &str, description: &str) {
        self.end_response_style();
        println!("{} {description}", self.highlight(command));
    }

    fn print_notice(&mut self, notice: &str) {
        self.end_response_style();
        if self.use_color {
            println!("{ANSI_GREY}{notice}{ANSI_RESET}");
        } else {
            println!("{notice}");
        }
    }

    fn print_error(&mut self, error: &str) {
        self.end_response_style();
        eprintln!("{error}");
    }

    fn clear_screen(&mut self) {
        self.end_response_style();
        print!("{ANSI_CLEAR_SCREEN}");
        self.flush();
    }

    fn print_interrupted(&mut self) {
        self.end_response_style();
        println!("\n[interrupted]");
        self.flush();
    }
}
