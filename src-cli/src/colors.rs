//! Terminal styling for CLI output.
//!
//! Colour is applied only when the target stream is a terminal, so piped
//! output and `--json` consumers always see plain text.

use loopgrab_common::CapturePhase;
use owo_colors::OwoColorize;
use std::io::IsTerminal;

/// How a line of output should look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// A capture is running
    Capturing,
    /// The last attempt failed
    Failed,
    /// Ready, or an accepted request
    Ready,
    /// Nothing to act on
    Muted,
    Label,
    /// Job steps before recording starts
    Preparing,
    /// Job steps after recording stops
    Finishing,
}

fn render(msg: &str, tone: Tone, color: bool) -> String {
    if !color {
        return msg.to_string();
    }
    match tone {
        Tone::Capturing => msg.red().bold().to_string(),
        Tone::Failed => msg.yellow().to_string(),
        Tone::Ready => msg.green().to_string(),
        Tone::Muted => msg.dimmed().to_string(),
        Tone::Label => msg.bold().to_string(),
        Tone::Preparing => msg.cyan().to_string(),
        Tone::Finishing => msg.yellow().to_string(),
    }
}

/// Style `msg` for stdout.
pub fn paint(msg: &str, tone: Tone) -> String {
    render(msg, tone, std::io::stdout().is_terminal())
}

/// Tone used for a job phase.
pub fn phase_tone(phase: CapturePhase) -> Tone {
    match phase {
        CapturePhase::Idle => Tone::Muted,
        CapturePhase::Recording | CapturePhase::AwaitingEnd => Tone::Capturing,
        CapturePhase::Stopping | CapturePhase::Transcoding | CapturePhase::Delivering => {
            Tone::Finishing
        }
        CapturePhase::Selecting | CapturePhase::Aligning | CapturePhase::Acquiring => {
            Tone::Preparing
        }
    }
}

/// Phase name styled for stdout.
pub fn phase(phase: CapturePhase) -> String {
    paint(phase.as_str(), phase_tone(phase))
}

fn render_error(msg: &str, color: bool) -> String {
    if color {
        format!("{} {}", "error:".red().bold(), msg)
    } else {
        format!("error: {}", msg)
    }
}

/// Error line for stderr.
pub fn error(msg: &str) -> String {
    render_error(msg, std::io::stderr().is_terminal())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_output_has_no_escapes() {
        for tone in [
            Tone::Capturing,
            Tone::Failed,
            Tone::Ready,
            Tone::Muted,
            Tone::Label,
            Tone::Preparing,
            Tone::Finishing,
        ] {
            assert_eq!(render("Ready.", tone, false), "Ready.");
        }
        assert_eq!(render_error("boom", false), "error: boom");
    }

    #[test]
    fn test_colored_output_wraps_message() {
        let styled = render("Capturing", Tone::Capturing, true);
        assert!(styled.contains("Capturing"));
        assert!(styled.starts_with('\u{1b}'));
        assert!(render_error("boom", true).ends_with("boom"));
    }

    #[test]
    fn test_phase_tones() {
        assert_eq!(phase_tone(CapturePhase::Idle), Tone::Muted);
        assert_eq!(phase_tone(CapturePhase::AwaitingEnd), Tone::Capturing);
        assert_eq!(phase_tone(CapturePhase::Transcoding), Tone::Finishing);
        assert_eq!(phase_tone(CapturePhase::Aligning), Tone::Preparing);
    }
}
