use std::env::current_dir;
use std::fs::write;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Parser;
use kbc_core::adapter::{AdapterConfig, AdapterRegistry};
use kbc_core::cache::{MemoryStore, ScheduleCache};
use kbc_core::feed::{self, FeedOptions, ReminderTime, DEFAULT_CALENDAR_NAME, DEFAULT_REMINDER};
use kbc_core::service::ScheduleService;

#[derive(Debug, Parser)]
pub struct Arguments {
    /// the council source id (see `tunbridge-wells`, `tmbc`, `maidstone`)
    pub source: String,
    /// the property postcode
    pub postcode: String,
    /// the property identifier (UPRN or house number)
    pub property: String,
    /// reminder time the evening before, HH:MM; empty disables the alarm
    #[arg(long, default_value = DEFAULT_REMINDER)]
    pub reminder: String,
    /// one event per bin type instead of grouping same-day collections
    #[arg(long)]
    pub no_group: bool,
    /// calendar display name
    #[arg(long, default_value = DEFAULT_CALENDAR_NAME)]
    pub name: String,
    /// domain used in event identifiers
    #[arg(long, default_value = "bins.local")]
    pub domain: String,
    /// WebDriver endpoint for browser-driven sources
    #[arg(long, default_value = "http://localhost:9515")]
    pub webdriver_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Arguments::parse();
    let reminder = if args.reminder.is_empty() {
        None
    } else {
        match ReminderTime::parse(&args.reminder) {
            Some(reminder) => Some(reminder),
            None => bail!("reminder must be HH:MM, got {:?}", args.reminder),
        }
    };

    let registry = AdapterRegistry::new(&AdapterConfig {
        webdriver_url: args.webdriver_url.clone(),
    });
    let service = ScheduleService::new(
        registry,
        ScheduleCache::new(Arc::new(MemoryStore::default())),
    );
    let result = service
        .get_schedule(&args.source, &args.postcode, &args.property)
        .await?;
    if result.entries.is_empty() {
        bail!("no collection data found for this property");
    }

    let options = FeedOptions {
        calendar_name: args.name,
        reminder,
        group_same_day: !args.no_group,
    };
    let calendar = feed::encode(&result.entries, &options, &args.domain, Utc::now());
    let mut path = current_dir()?;
    path.push("calendar.ics");
    write(path, calendar)?;
    Ok(())
}
