use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select};
use std::path::{Path, PathBuf};
use weather_core::{ConditionField, Config, WeatherLookup};

use crate::server;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather lookup service")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server.
    Serve {
        /// Address to listen on; overrides `server.bind` from the config.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Look up the current weather for a city once and print it.
    Show {
        /// City name, passed to OpenWeather as typed.
        city: String,
    },

    /// Store the OpenWeather API key and extraction settings.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };

        match self.command {
            Command::Serve { bind } => {
                let config = Config::load_from(&path)?;
                let bind = bind.unwrap_or_else(|| config.server.bind.clone());
                server::serve(&config, &bind).await
            }
            Command::Show { city } => {
                let config = Config::load_from(&path)?;
                let lookup = WeatherLookup::from_config(&config)?;
                let report = lookup.handle(Some(city.as_str())).await?;

                let out = serde_json::to_string_pretty(&report.attributes())
                    .context("Failed to serialize weather report")?;
                println!("{out}");
                Ok(())
            }
            Command::Configure => configure(&path),
        }
    }
}

fn configure(path: &Path) -> anyhow::Result<()> {
    // Env overrides stay out of the file.
    let mut config = Config::read_from(path)?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(api_key.trim().to_string());

    let current = config.openweather.condition_field;
    let start = ConditionField::ALL
        .iter()
        .position(|f| *f == current)
        .unwrap_or_default();
    config.openweather.condition_field =
        Select::new("Condition taken from weather[0]:", ConditionField::ALL.to_vec())
            .with_starting_cursor(start)
            .prompt()
            .context("Failed to read condition field")?;

    config.save_to(path)?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}
