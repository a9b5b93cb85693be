use crate::registry::{RunEvent, SiteKey, SiteStats};
use crossterm::{
    cursor::MoveToPreviousLine,
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::io;

const BAR_WIDTH: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SiteStatus {
    Pending,
    Running,
    Done,
    Failed,
}

struct SiteLine {
    site: SiteKey,
    status: SiteStatus,
    detail: String,
}

/// Live terminal view of a multi-site run: one line per site plus a bar.
pub struct SiteProgress {
    lines: Vec<SiteLine>,
    drawn: bool,
}

impl SiteProgress {
    pub fn new(sites: &[SiteKey]) -> Self {
        Self {
            lines: sites
                .iter()
                .map(|site| SiteLine {
                    site: *site,
                    status: SiteStatus::Pending,
                    detail: String::new(),
                })
                .collect(),
            drawn: false,
        }
    }

    pub fn handle(&mut self, event: RunEvent<'_>) -> io::Result<()> {
        match event {
            RunEvent::Started { site, .. } => self.set(site, SiteStatus::Running, "scraping...".to_string()),
            RunEvent::Finished { site, stats } => {
                let (status, detail) = finished_line(stats);
                self.set(site, status, detail)
            }
        }
    }

    fn set(&mut self, site: SiteKey, status: SiteStatus, detail: String) -> io::Result<()> {
        if let Some(line) = self.lines.iter_mut().find(|line| line.site == site) {
            line.status = status;
            line.detail = detail;
        }
        self.redraw()
    }

    fn redraw(&mut self) -> io::Result<()> {
        let mut out = io::stdout();
        if self.drawn {
            // site lines, separator, bar
            execute!(
                out,
                MoveToPreviousLine((self.lines.len() + 2) as u16),
                Clear(ClearType::FromCursorDown),
            )?;
        }

        for line in &self.lines {
            let (color, icon) = match line.status {
                SiteStatus::Pending => (Color::DarkGrey, "⏳"),
                SiteStatus::Running => (Color::White, "🔄"),
                SiteStatus::Done => (Color::Green, "✅"),
                SiteStatus::Failed => (Color::Red, "❌"),
            };
            execute!(
                out,
                SetForegroundColor(color),
                Print(format!("  {} {:<24} {}\n", icon, line.site.name(), line.detail)),
                ResetColor
            )?;
        }

        let done = self.count(SiteStatus::Done);
        let failed = self.count(SiteStatus::Failed);
        execute!(
            out,
            Print("─".repeat(80)),
            Print("\n"),
            SetForegroundColor(Color::White),
            Print(progress_text(done, failed, self.lines.len())),
            Print("\n"),
            ResetColor
        )?;
        self.drawn = true;
        Ok(())
    }

    fn count(&self, status: SiteStatus) -> usize {
        self.lines.iter().filter(|line| line.status == status).count()
    }

    pub fn finish(&mut self, total_properties: usize) -> io::Result<()> {
        let failed = self.count(SiteStatus::Failed);
        execute!(
            io::stdout(),
            SetForegroundColor(Color::Green),
            Print(format!("✅ Scraping completed: {} properties", total_properties)),
            ResetColor
        )?;
        if failed > 0 {
            execute!(
                io::stdout(),
                SetForegroundColor(Color::Red),
                Print(format!(", {} sites failed", failed)),
                ResetColor
            )?;
        }
        execute!(io::stdout(), Print("\n"))
    }
}

fn finished_line(stats: &SiteStats) -> (SiteStatus, String) {
    if stats.success {
        (
            SiteStatus::Done,
            format!("{} properties in {:.1}s", stats.properties_found, stats.duration_secs),
        )
    } else {
        (
            SiteStatus::Failed,
            stats.error.clone().unwrap_or_else(|| "failed".to_string()),
        )
    }
}

/// Sites finished (done or failed) out of `total`, as a bar.
fn progress_text(done: usize, failed: usize, total: usize) -> String {
    let finished = done + failed;
    let percentage = if total > 0 { finished * 100 / total } else { 0 };
    let filled = finished * BAR_WIDTH / total.max(1);
    let bar = format!("[{}{}]", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));

    if failed > 0 {
        format!("Sites: {} {}/{} ({}%) | {} failed", bar, finished, total, percentage, failed)
    } else {
        format!("Sites: {} {}/{} ({}%)", bar, finished, total, percentage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    #[test]
    fn bar_reflects_finished_sites() {
        assert_eq!(
            progress_text(0, 0, 3),
            format!("Sites: [{}] 0/3 (0%)", "░".repeat(30))
        );
        assert_eq!(
            progress_text(2, 1, 3),
            format!("Sites: [{}] 3/3 (100%) | 1 failed", "█".repeat(30))
        );
        assert_eq!(progress_text(0, 0, 0), format!("Sites: [{}] 0/0 (0%)", "░".repeat(30)));
    }

    #[test]
    fn finished_line_shows_error() {
        let stats = SiteStats {
            site_name: "Seibu Real Estate".to_string(),
            properties_found: 0,
            duration_secs: 1.0,
            success: false,
            error: Some("no listing page could be fetched".to_string()),
            timestamp: Local::now(),
        };
        let (status, detail) = finished_line(&stats);
        assert_eq!(status, SiteStatus::Failed);
        assert_eq!(detail, "no listing page could be fetched");
    }
}
