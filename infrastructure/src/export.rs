use docx_rs::{Docx, Paragraph, Run};
use domain::itinerary::{DayView, Itinerary};
use shared::types::Result;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// What an exported document is built from.
pub struct ItineraryDocument {
    pub destination: String,
    pub day_count: usize,
    pub days: Vec<DayView>,
}

impl ItineraryDocument {
    pub fn from_itinerary(itinerary: &Itinerary) -> Self {
        let days = itinerary.day_views();
        Self {
            destination: itinerary.destination_label(),
            day_count: days.len(),
            days,
        }
    }

    /// `itinerario-<destination>.docx`, lowercase and dash separated.
    pub fn default_file_name(&self) -> PathBuf {
        let slug = self
            .destination
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        let slug = if slug.is_empty() { "viaje".to_string() } else { slug };
        PathBuf::from(format!("itinerario-{}.docx", slug))
    }

    fn compose(&self) -> Docx {
        let mut docx = Docx::new()
            .add_paragraph(
                Paragraph::new().add_run(Run::new().add_text(&self.destination).bold().size(40)),
            )
            .add_paragraph(
                Paragraph::new().add_run(Run::new().add_text(format!("{} días", self.day_count)).italic()),
            );

        for day in &self.days {
            let mut heading = format!("Día {}", day.number);
            if let Some(title) = &day.title {
                heading.push_str(" · ");
                heading.push_str(title);
            }
            docx = docx.add_paragraph(
                Paragraph::new().add_run(Run::new().add_text(heading).bold().size(28)),
            );
            if let Some(summary) = &day.summary {
                docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(summary)));
            }
            for entry in &day.entries {
                let mut line = String::new();
                if let Some(time) = &entry.time {
                    line.push_str(time);
                    line.push(' ');
                }
                line.push_str(&format!("{}: {} [{}]", entry.label, entry.text, entry.category));
                docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)));
                if let Some(details) = &entry.details {
                    docx = docx.add_paragraph(
                        Paragraph::new().add_run(Run::new().add_text(details).italic().size(18)),
                    );
                }
            }
            if let Some(tip) = &day.tip {
                docx = docx.add_paragraph(
                    Paragraph::new()
                        .add_run(Run::new().add_text("Tip Pro: ").bold())
                        .add_run(Run::new().add_text(tip)),
                );
            }
        }
        docx
    }

    pub fn write_docx(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        self.compose().build().pack(file)?;
        info!(path = %path.display(), days = self.day_count, "itinerary exported");
        Ok(())
    }
}
