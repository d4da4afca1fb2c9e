use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::app::{LoadResult, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_load(results: &[LoadResult]) -> io::Result<()> {
        Self::print_json(&results)
    }

    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

pub fn print_summary(result: &LoadResult) {
    println!("Package: {}", result.package);
    if let Some(title) = &result.title {
        println!("  title: {title}");
    }
    if let Some(project_type) = &result.project_type {
        println!("  project type: {project_type}");
    }
    for kind in &result.kinds {
        println!(
            "  {}: {} entities from {} resource(s), {} fields, {} with location",
            kind.kind, kind.entities, kind.resources, kind.fields, kind.located
        );
    }
    println!("  warnings: {}", result.warnings.len());
}
