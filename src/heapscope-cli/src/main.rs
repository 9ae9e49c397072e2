mod cli;
mod commands;
mod config;
mod image;

use anyhow::Result;
use clap::Parser;
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "heapscope=debug"
    } else {
        "heapscope=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let json = cli.json;
    let session = || -> Result<heapscope::Session> {
        image::open_session(&cli.image, &Config::load()?)
    };

    match cli.command {
        Commands::Configure {
            profile,
            maps,
            clear,
            show,
        } => commands::configure::handle(profile, maps, clear, show)?,

        Commands::Profile => commands::profile::handle(&session()?, json)?,

        Commands::Class {
            address,
            fields,
            size,
        } => commands::class::handle(&session()?, address, fields, size, json)?,

        Commands::Field {
            class,
            name,
            signature,
        } => commands::class::handle_field(&session()?, class, &name, signature.as_deref(), json)?,

        Commands::Object { address } => commands::object::handle(&session()?, address, json)?,

        Commands::String { address } => {
            commands::object::handle_string(&session()?, address, json)?
        }

        Commands::Array {
            address,
            start,
            length,
        } => commands::object::handle_array(&session()?, address, start, length, json)?,

        Commands::Read { address, size } => {
            commands::read::handle(&session()?, address, size, json)?
        }

        Commands::Shrc { command } => match command {
            ShrcCommand::Record {
                address,
                kind,
                layers,
            } => commands::shrc::handle_record(&session()?, address, &kind, &layers, json)?,

            ShrcCommand::Items {
                start,
                end,
                records,
                skip_stale,
                layers,
            } => commands::shrc::handle_items(
                &session()?,
                start,
                end,
                records,
                skip_stale,
                &layers,
                json,
            )?,
        },

        Commands::Tags { command } => match command {
            TagsCommand::Check { address, freed } => {
                commands::tags::handle_check(&session()?, address, freed, json)?
            }

            TagsCommand::Scan {
                start,
                end,
                corrupt_only,
            } => commands::tags::handle_scan(&session()?, start, end, corrupt_only, json)?,
        },
    }

    Ok(())
}
