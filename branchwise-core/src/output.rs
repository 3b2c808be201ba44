//! # Output Formatting
//!
//! Status messages with emojis and colour. Colour honours the global override
//! installed from `--colors` and falls back to terminal detection.

use owo_colors::{OwoColorize, Stream, Style};

/// Colour mode selected on the command line.
#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorMode {
  /// Enable colored output
  Yes,
  /// Enable colored output (alias for Yes)
  Always,
  /// Detect from the terminal
  #[default]
  Auto,
  /// Disable colored output
  No,
  /// Disable colored output (alias for No)
  Never,
}

impl ColorMode {
  /// Install the global colour override. `Auto` leaves detection to
  /// owo-colors.
  pub fn apply(self) {
    match self {
      ColorMode::Yes | ColorMode::Always => owo_colors::set_override(true),
      ColorMode::No | ColorMode::Never => owo_colors::set_override(false),
      ColorMode::Auto => {}
    }
  }
}

/// Emoji for `name`, or `default` when the shortcode is unknown.
pub fn get_emoji_or_default(name: &str, default: &str) -> String {
  match emojis::get_by_shortcode(name) {
    Some(emoji) => emoji.to_string(),
    None => default.to_string(),
  }
}

/// Apply `style` when the stream supports colour.
pub fn paint(text: &str, style: Style, stream: Stream) -> String {
  text.if_supports_color(stream, |text| text.style(style)).to_string()
}

pub fn print_success(message: &str) {
  let check = get_emoji_or_default("check_mark", "✓");
  println!("{} {}", paint(&check, Style::new().green().bold(), Stream::Stdout), message);
}

/// Print an error message to stderr
pub fn print_error(message: &str) {
  let cross = get_emoji_or_default("cross_mark", "✗");
  eprintln!("{} {}", paint(&cross, Style::new().red().bold(), Stream::Stderr), message);
}

/// Print a warning to stderr so machine-readable stdout stays clean
pub fn print_warning(message: &str) {
  let warning = get_emoji_or_default("warning", "⚠");
  eprintln!("{} {}", paint(&warning, Style::new().yellow().bold(), Stream::Stderr), message);
}

pub fn print_info(message: &str) {
  let info = get_emoji_or_default("information", "ℹ");
  println!("{} {}", paint(&info, Style::new().blue().bold(), Stream::Stdout), message);
}

pub fn print_header(header: &str) {
  println!("\n{}", paint(header, Style::new().blue().bold(), Stream::Stdout));
}

/// Format a repository path
pub fn format_repo_path(path: &str) -> String {
  paint(path, Style::new().bright_green(), Stream::Stdout)
}

/// Format a timestamp
pub fn format_timestamp(timestamp: &str) -> String {
  paint(timestamp, Style::new().yellow(), Stream::Stdout)
}
