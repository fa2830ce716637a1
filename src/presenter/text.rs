//! Plain-text rendering for terminals and logs.

use crate::presenter::{DisplayModel, VerdictView};

use std::fmt::{self, Write};

const BAR_WIDTH: usize = 20;

fn bar(fill: f64) -> String {
    let filled = ((fill.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn write_verdict(out: &mut String, view: &VerdictView) -> fmt::Result {
    writeln!(out, "*** {} ***", view.banner)?;
    writeln!(
        out,
        "malicious: {}  suspicious: {}  clean: {}  total: {}",
        view.malicious, view.suspicious, view.clean, view.total
    )?;
    write!(out, "clean rate: {} {}", view.clean_rate_label, bar(view.clean_rate_fill))?;
    if view.no_engines_reported {
        write!(out, " (no engines reported)")?;
    }
    writeln!(out)?;
    for block in &view.hashes {
        writeln!(out, "{:<8} {}", format!("{}:", block.label), block.value)?;
    }
    Ok(())
}

fn write_model(out: &mut String, model: &DisplayModel) -> fmt::Result {
    match model {
        DisplayModel::Intake { file: None } => {
            writeln!(out, "Drop a file or browse to select one.")
        }
        DisplayModel::Intake { file: Some(card) } => {
            writeln!(out, "Selected: {} ({})", card.name, card.size_label)
        }
        DisplayModel::Scanning {
            file,
            step,
            percent_label,
            segments,
            ..
        } => {
            let indicator: String = segments.iter().map(|&lit| if lit { '#' } else { '.' }).collect();
            writeln!(
                out,
                "Scanning {}: {} {} [{}]",
                file.name, step, percent_label, indicator
            )
        }
        DisplayModel::Completed { file, verdict } => {
            writeln!(out, "{} ({})", file.name, file.size_label)?;
            write_verdict(out, verdict)
        }
        DisplayModel::Failed { file, kind, reason } => {
            writeln!(out, "Scan of {} failed ({}): {}", file.name, kind, reason)
        }
    }
}

/// Renders a display model as multi-line text.
pub fn render_text(model: &DisplayModel) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_model(&mut out, model);
    out
}

impl fmt::Display for DisplayModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_text(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DigestKind, HexDigest, ScanVerdict, SelectedFile, SessionId};
    use crate::orchestrator::SessionState;
    use crate::presenter::render;

    #[test]
    fn test_bar_bounds() {
        assert_eq!(bar(0.0), format!("[{}]", "-".repeat(20)));
        assert_eq!(bar(1.5), format!("[{}]", "#".repeat(20)));
        assert_eq!(bar(0.5), format!("[{}{}]", "#".repeat(10), "-".repeat(10)));
    }

    #[test]
    fn test_completed_text() {
        let md5 = HexDigest::parse(DigestKind::Md5, &"1".repeat(32)).unwrap();
        let state = SessionState::Completed {
            session: SessionId::new(1),
            file: SelectedFile::from_bytes("doc.pdf", vec![0u8; 10]).unwrap(),
            verdict: ScanVerdict::new(0, 3, 7, 10).with_digest(md5),
        };

        let text = render(&state).to_string();
        assert!(text.contains("*** SUSPICIOUS FILE ***"));
        assert!(text.contains("clean rate: 70.0%"));
        assert!(text.contains(&format!("MD5:     {}", "1".repeat(32))));
        assert!(!text.contains("SHA-256"));
    }

    #[test]
    fn test_idle_text() {
        let text = render_text(&render(&SessionState::Idle));
        assert!(text.starts_with("Drop a file"));
    }
}
