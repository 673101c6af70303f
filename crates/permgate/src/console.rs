//! Colorful console output for activation events.
//!
//! Provides a custom `tracing` layer that formats registry and activation
//! events with colors. Enabled with the `console` feature.

use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();

/// Initializes console output.
///
/// Safe to call multiple times - only the first call has effect.
/// `RUST_LOG` directives are honored; `permgate_network` defaults to info.
pub fn init() {
    INIT.get_or_init(|| {
        let mut filter = EnvFilter::from_default_env();
        if let Ok(directive) = "permgate_network=info".parse::<Directive>() {
            filter = filter.add_directive(directive);
        }

        // another subscriber may already be installed by the host
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(ActivationConsoleLayer)
            .try_init();
    });
}

/// A tracing layer that formats permgate events with colors.
pub struct ActivationConsoleLayer;

impl<S: Subscriber> Layer<S> for ActivationConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with("permgate") {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let output = format_event(*metadata.level(), &visitor);
        if !output.is_empty() {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }
}

#[derive(Default)]
struct EventVisitor {
    event: Option<String>,
    constraint_id: Option<String>,
    perm_id: Option<String>,
    replaced: Option<String>,
    from: Option<String>,
    to: Option<String>,
    fact: Option<String>,
    error: Option<String>,
    sequence: Option<u64>,
    nodes: Option<u64>,
    recomputed: Option<u64>,
    changed_nodes: Option<u64>,
}

impl EventVisitor {
    fn set_text(&mut self, name: &str, value: String) {
        match name {
            "event" => self.event = Some(value),
            "constraint_id" => self.constraint_id = Some(value),
            "perm_id" => self.perm_id = Some(value),
            "replaced" => self.replaced = Some(value),
            "from" => self.from = Some(value),
            "to" => self.to = Some(value),
            "fact" => self.fact = Some(value),
            "error" => self.error = Some(value),
            _ => {}
        }
    }
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let s = format!("{:?}", value);
        self.set_text(field.name(), s.trim_matches('"').to_string());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.set_text(field.name(), value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "sequence" => self.sequence = Some(value),
            "nodes" => self.nodes = Some(value),
            "recomputed" => self.recomputed = Some(value),
            "changed_nodes" => self.changed_nodes = Some(value),
            _ => {}
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_u64(field, value as u64);
    }
}

fn format_event(level: Level, v: &EventVisitor) -> String {
    let text = |s: &Option<String>| s.clone().unwrap_or_else(|| "?".to_string());

    let body = match v.event.as_deref() {
        Some("constraint_added") => format!(
            "{} {} for {} ({} nodes)",
            "+".bright_green(),
            text(&v.constraint_id).white().bold(),
            text(&v.perm_id).bright_cyan(),
            v.nodes.unwrap_or(0).to_string().yellow()
        ),
        Some("constraint_replaced") => format!(
            "{} {} replaces {}",
            "~".bright_yellow(),
            text(&v.constraint_id).white().bold(),
            text(&v.replaced).bright_black()
        ),
        Some("constraint_removed") => format!(
            "{} {} ({} nodes left)",
            "-".bright_red(),
            text(&v.constraint_id).white().bold(),
            v.nodes.unwrap_or(0).to_string().yellow()
        ),
        Some("activation") => format!(
            "{} {} {} {} {}",
            format!("#{}", v.sequence.unwrap_or(0)).bright_black(),
            text(&v.constraint_id).white().bold(),
            format_state(&text(&v.from)),
            "->".bright_blue(),
            format_state(&text(&v.to))
        ),
        Some("propagate") => format!(
            "{} recomputed {}, changed {}",
            "~".bright_black(),
            v.recomputed.unwrap_or(0).to_string().yellow(),
            v.changed_nodes.unwrap_or(0).to_string().yellow()
        ),
        Some("fact_fetch_failed") => format!(
            "{} fact {} unavailable: {}",
            "!".bright_red(),
            text(&v.fact).bright_cyan(),
            text(&v.error)
        ),
        Some("compile_failed") => format!(
            "{} {} failed to compile: {}",
            "!".bright_red().bold(),
            text(&v.constraint_id).white().bold(),
            text(&v.error).bright_red()
        ),
        _ => return String::new(),
    };

    format!("{} {} {}", timestamp().bright_black(), format_level(level), body)
}

fn format_level(level: Level) -> String {
    match level {
        Level::ERROR => "ERROR".bright_red().bold().to_string(),
        Level::WARN => " WARN".yellow().to_string(),
        Level::INFO => " INFO".bright_green().to_string(),
        _ => "DEBUG".bright_black().to_string(),
    }
}

fn format_state(state: &str) -> String {
    match state {
        "active" => state.bright_green().bold().to_string(),
        "inactive" => state.bright_red().to_string(),
        "indeterminate" => state.yellow().to_string(),
        _ => state.white().to_string(),
    }
}

fn timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| {
            let secs = d.as_secs() % 100000;
            let millis = d.subsec_millis();
            format!("{:5}.{:03}", secs, millis)
        })
        .unwrap_or_else(|_| "    0.000".to_string())
}
