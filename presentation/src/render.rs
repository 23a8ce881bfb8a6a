use colored::Colorize;
use crossterm::{cursor, terminal, QueueableCommand};
use domain::conversation::Conversation;
use domain::itinerary::{DayView, Itinerary};
use domain::message::Message;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const FALLBACK_WIDTH: u16 = 60;
const MAX_WIDTH: u16 = 80;

fn width() -> usize {
    let cols = terminal::size().map(|(cols, _)| cols).unwrap_or(FALLBACK_WIDTH);
    cols.min(MAX_WIDTH) as usize
}

pub fn separator() -> String {
    "─".repeat(width())
}

/// Turn `**bold**` spans into terminal bold.
pub fn emphasize(text: &str) -> String {
    text.split("**")
        .enumerate()
        .map(|(i, part)| {
            if i % 2 == 1 {
                part.bold().to_string()
            } else {
                part.to_string()
            }
        })
        .collect()
}

pub fn print_message(message: &Message) {
    if message.is_user() {
        println!("{} {}", "tú ›".green().bold(), message.content);
    } else {
        let body = emphasize(&message.content);
        let mut lines = body.lines();
        println!("{} {}", "RutaÑ ›".red().bold(), lines.next().unwrap_or_default());
        for line in lines {
            println!("        {}", line);
        }
    }
}

pub fn print_messages(messages: &[Message]) {
    for message in messages {
        print_message(message);
    }
}

/// Numbered conversation listing, the active one marked.
pub fn print_conversation_list(list: &[&Conversation], active_id: &str) {
    println!("{}", "Conversaciones".bold());
    for (i, conv) in list.iter().enumerate() {
        let marker = if conv.id == active_id { "●".red().to_string() } else { " ".to_string() };
        let badge = if conv.itinerary.is_some() { " 🗺️" } else { "" };
        println!(
            "{} {} {}{}  {}",
            marker,
            format!("[{}]", i + 1).blue(),
            conv.title,
            badge,
            conv.date.format("%d/%m/%Y %H:%M").to_string().dimmed()
        );
    }
}

/// Plain-text lines of one day card.
pub fn day_card_lines(day: &DayView) -> Vec<String> {
    let mut lines = Vec::new();
    let mut heading = format!("Día {}", day.number);
    if let Some(title) = &day.title {
        heading.push_str(" · ");
        heading.push_str(title);
    }
    lines.push(heading);
    if let Some(summary) = &day.summary {
        lines.push(summary.clone());
    }
    for entry in &day.entries {
        let when = entry.time.as_deref().map(|t| format!("{} ", t)).unwrap_or_default();
        lines.push(format!("  • {}{}: {} [{}]", when, entry.label, entry.text, entry.category));
        if let Some(details) = &entry.details {
            lines.push(format!("      {}", details));
        }
    }
    if let Some(tip) = &day.tip {
        lines.push(format!("  Tip Pro: {}", tip));
    }
    lines
}

pub fn print_itinerary(itinerary: &Itinerary) {
    let days = itinerary.day_views();
    println!("{}", separator().dimmed());
    println!(
        "{}  {}",
        itinerary.destination_label().red().bold(),
        format!("{} días", days.len()).italic()
    );
    if let Some(summary) = &itinerary.summary {
        println!("{}", summary);
    }
    for day in &days {
        println!("{}", separator().dimmed());
        let mut lines = day_card_lines(day).into_iter();
        if let Some(heading) = lines.next() {
            println!("{}", heading.yellow().bold());
        }
        for line in lines {
            println!("{}", line);
        }
    }
    println!("{}", separator().dimmed());
}

/// Animated "thinking" line on stderr while a request is in flight.
pub struct BusyIndicator {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl BusyIndicator {
    pub fn start(label: &str) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let label = label.to_string();
        let handle = tokio::spawn(async move {
            let frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
            let mut tick = 0usize;
            while flag.load(Ordering::Acquire) {
                let mut err = std::io::stderr();
                let _ = err.queue(cursor::MoveToColumn(0));
                let _ = err.queue(terminal::Clear(terminal::ClearType::CurrentLine));
                let _ = write!(err, "{} {}", frames[tick % frames.len()].red(), label.dimmed());
                let _ = err.flush();
                tick += 1;
                tokio::time::sleep(Duration::from_millis(90)).await;
            }
            let mut err = std::io::stderr();
            let _ = err.queue(cursor::MoveToColumn(0));
            let _ = err.queue(terminal::Clear(terminal::ClearType::CurrentLine));
            let _ = err.flush();
        });
        Self { running, handle }
    }

    pub async fn stop(self) {
        self.running.store(false, Ordering::Release);
        let _ = self.handle.await;
    }
}
