//! Terminal styling for handoff output
//!
//! Semantic styles via the [`Stylize`] trait; color support detection is
//! delegated to `owo-colors` (`NO_COLOR`, `CLICOLOR`, TTY detection).
//!
//! | Method        | Color  | Stream | Used for                          |
//! |---------------|--------|--------|-----------------------------------|
//! | `.accent()`   | Cyan   | stdout | Logins, server URLs, commands     |
//! | `.success()`  | Green  | stdout | Finished logins                   |
//! | `.error()`    | Red    | stderr | Failures                          |
//! | `.warn()`     | Yellow | stderr | Non-fatal problems                |
//! | `.muted()`    | Dim    | stdout | Hints, masked tokens, timestamps  |
//! | `.emphasis()` | Bold   | stdout | Headings                          |

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Style};
use std::fmt::{self, Display};
use std::sync::OnceLock;
use std::time::Duration;

pub use owo_colors::Stream;

const ACCENT: Style = Style::new().cyan();
const SUCCESS: Style = Style::new().green();
const ERROR: Style = Style::new().red();
const WARN: Style = Style::new().yellow();
const MUTED: Style = Style::new().dimmed();
const EMPHASIS: Style = Style::new().bold();

/// A value with semantic styling applied
#[derive(Clone, Debug)]
pub struct Styled<T> {
    value: T,
    style: Style,
    stream: Stream,
}

impl<T> Styled<T> {
    const fn new(value: T, style: Style, stream: Stream) -> Self {
        Self {
            value,
            style,
            stream,
        }
    }

    /// Detect color support on stderr instead
    #[must_use]
    pub const fn for_stderr(mut self) -> Self {
        self.stream = Stream::Stderr;
        self
    }
}

impl<T: Display> Display for Styled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.value
                .if_supports_color(self.stream, |v| v.style(self.style))
        )
    }
}

/// Extension trait for semantic terminal styling
pub trait Stylize: Display {
    /// Cyan, for logins, server URLs and commands
    fn accent(&self) -> Styled<&Self> {
        Styled::new(self, ACCENT, Stream::Stdout)
    }

    /// Green, for finished logins
    fn success(&self) -> Styled<&Self> {
        Styled::new(self, SUCCESS, Stream::Stdout)
    }

    /// Red, rendered for stderr
    fn error(&self) -> Styled<&Self> {
        Styled::new(self, ERROR, Stream::Stderr)
    }

    /// Yellow, rendered for stderr
    fn warn(&self) -> Styled<&Self> {
        Styled::new(self, WARN, Stream::Stderr)
    }

    /// Dim, for hints and secondary details
    fn muted(&self) -> Styled<&Self> {
        Styled::new(self, MUTED, Stream::Stdout)
    }

    /// Bold
    fn emphasis(&self) -> Styled<&Self> {
        Styled::new(self, EMPHASIS, Stream::Stdout)
    }
}

impl<T: Display + ?Sized> Stylize for T {}

/// Green checkmark
pub const fn check() -> Styled<&'static str> {
    Styled::new("✓", SUCCESS, Stream::Stdout)
}

/// Red cross (stderr)
pub const fn cross() -> Styled<&'static str> {
    Styled::new("✗", ERROR, Stream::Stderr)
}

/// Cyan arrow for next steps
pub const fn arrow() -> Styled<&'static str> {
    Styled::new("→", ACCENT, Stream::Stdout)
}

const fn to_hyperlink_stream(stream: Stream) -> supports_hyperlinks::Stream {
    match stream {
        Stream::Stdout => supports_hyperlinks::Stream::Stdout,
        Stream::Stderr => supports_hyperlinks::Stream::Stderr,
    }
}

/// Clickable OSC 8 link showing the URL itself, plain text where unsupported
pub fn hyperlink_url(stream: Stream, url: &str) -> String {
    if supports_hyperlinks::on(to_hyperlink_stream(stream)) {
        terminal_link::Link::new(url, url).to_string()
    } else {
        url.to_string()
    }
}

/// Cyan dots spinner style
///
/// Template validated once on first call via `OnceLock`.
pub fn spinner_style() -> ProgressStyle {
    static STYLE: OnceLock<ProgressStyle> = OnceLock::new();
    STYLE
        .get_or_init(|| {
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .expect("hardcoded spinner template is valid")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        })
        .clone()
}

/// Steadily ticking spinner on stderr
pub fn spinner(message: impl Into<std::borrow::Cow<'static, str>>) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_style(spinner_style());
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
