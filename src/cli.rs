//! Config Toolkit - CLI Tool
//!
//! Command-line front end for the configuration service: manage profiles and
//! their properties, inspect the effective configuration.

use anyhow::Result;
use clap::{Parser, Subcommand};
use config_toolkit::gateway::{Profile, ProfileId, Property, PropertyDetails, PropertyId};
use config_toolkit::{AppState, GatewayConfig, Level, Outcome, DEFAULT_LOG_FILTER};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "toolkit")]
#[command(about = "CLI for the layered configuration service")]
struct Cli {
    /// Configuration service base URL (overrides config file and TOOLKIT_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Path to the YAML config file
    #[arg(long, env = "TOOLKIT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Profile operations
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Operations on the properties of one profile
    Property {
        #[command(subcommand)]
        action: PropertyAction,
    },

    /// Effective (precedence-resolved) configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// List profiles, highest precedence first
    List {
        /// Only active profiles
        #[arg(long)]
        active_only: bool,
    },

    /// Create a profile at the end of the order
    Add {
        name: String,

        /// Create the profile deactivated
        #[arg(long)]
        inactive: bool,
    },

    /// Rename a profile
    Rename { id: String, name: String },

    /// Delete a profile and its properties
    Delete { id: String },

    /// Raise precedence by one position
    Up { id: String },

    /// Lower precedence by one position
    Down { id: String },

    /// Include the profile in resolution
    Activate { id: String },

    /// Exclude the profile from resolution
    Deactivate { id: String },
}

#[derive(Subcommand)]
enum PropertyAction {
    /// List the properties defined by a profile
    List { profile: String },

    /// Add a property to a profile
    Add {
        profile: String,
        name: String,
        value: String,
    },

    /// Set a property's value
    Set {
        profile: String,
        property: String,
        value: String,
    },

    /// Rename a property (it receives a new id)
    Rename {
        profile: String,
        property: String,
        name: String,
    },

    /// Delete a property
    Delete { profile: String, property: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// List effective values
    List {
        /// Resolve over active profiles only
        #[arg(long)]
        active_only: bool,
    },

    /// Show every definition of a property, highest precedence first
    Show { name: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = GatewayConfig::from_yaml_and_env(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        config.base_url = url;
    }

    let state = AppState::new(config)?;
    state.bus.register_listener("console", print_notification)?;

    let ok = match cli.command {
        Commands::Profile { action } => handle_profile(&state, action).await,
        Commands::Property { action } => handle_property(&state, action).await,
        Commands::Config { action } => handle_config(&state, action).await,
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_notification(level: Level, message: &str, title: Option<&str>) {
    let tag = match level {
        Level::Info => "info",
        Level::Warn => "warning",
        Level::Error => "error",
    };
    match title {
        Some(title) => eprintln!("{tag}: {title}: {message}"),
        None => eprintln!("{tag}: {message}"),
    }
}

/// Print an acknowledgement for a mutation. Failures were already reported.
fn confirm<T>(outcome: Outcome<T>, message: &str) -> bool {
    match outcome {
        Outcome::Ok(_) => {
            println!("{}", message);
            true
        }
        Outcome::Failed(_) => false,
    }
}

fn print_profiles(profiles: &[Profile]) {
    println!("{:<4} {:<12} {:<8} {:<6} NAME", "POS", "ID", "ACTIVE", "PROPS");
    println!("{}", "-".repeat(60));
    for (pos, p) in profiles.iter().enumerate() {
        println!(
            "{:<4} {:<12} {:<8} {:<6} {}",
            pos + 1,
            p.id,
            if p.active { "yes" } else { "no" },
            p.properties_count
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".into()),
            p.name
        );
    }
}

fn print_properties(properties: &[Property]) {
    println!("{:<12} {:<12} {:<30} VALUE", "ID", "PROFILE", "NAME");
    println!("{}", "-".repeat(80));
    for p in properties {
        println!(
            "{:<12} {:<12} {:<30} {}",
            p.id,
            p.profile.as_ref().map(ProfileId::as_str).unwrap_or("-"),
            p.name,
            p.value
        );
    }
}

/// The service lists the winning binding first; `*` marks it.
fn print_details(details: &PropertyDetails) {
    for (pos, binding) in details.chain().enumerate() {
        let marker = if pos == 0 { "*" } else { " " };
        println!(
            "{} {:<20} {:<8} {} = {}",
            marker,
            binding.profile_name,
            if binding.active { "active" } else { "inactive" },
            binding.name,
            binding.value
        );
    }
}

async fn handle_profile(state: &AppState, action: ProfileAction) -> bool {
    let gateway = &state.gateway;
    match action {
        ProfileAction::List { active_only } => {
            let outcome = if active_only {
                gateway.get_active_profiles().await
            } else {
                gateway.get_profiles().await
            };
            match outcome {
                Outcome::Ok(profiles) => {
                    print_profiles(&profiles);
                    true
                }
                Outcome::Failed(_) => false,
            }
        }

        ProfileAction::Add { name, inactive } => {
            let outcome = gateway.add_profile(&name, !inactive).await;
            match outcome {
                Outcome::Ok(Some(profile)) => {
                    println!("Created profile {}: {}", profile.id, profile.name);
                    true
                }
                Outcome::Ok(None) => {
                    println!("Created profile: {}", name);
                    true
                }
                Outcome::Failed(_) => false,
            }
        }

        ProfileAction::Rename { id, name } => {
            let outcome = gateway.rename_profile(&ProfileId::new(id), &name).await;
            confirm(outcome, &format!("Renamed profile to: {}", name))
        }

        ProfileAction::Delete { id } => {
            let id = ProfileId::new(id);
            let outcome = gateway.delete_profile(&id).await;
            confirm(outcome, &format!("Deleted profile {}", id))
        }

        ProfileAction::Up { id } => {
            let id = ProfileId::new(id);
            let outcome = gateway.move_profile_up(&id).await;
            confirm(outcome, &format!("Moved profile {} up", id))
        }

        ProfileAction::Down { id } => {
            let id = ProfileId::new(id);
            let outcome = gateway.move_profile_down(&id).await;
            confirm(outcome, &format!("Moved profile {} down", id))
        }

        ProfileAction::Activate { id } => {
            let id = ProfileId::new(id);
            let outcome = gateway.activate_profile(&id).await;
            confirm(outcome, &format!("Activated profile {}", id))
        }

        ProfileAction::Deactivate { id } => {
            let id = ProfileId::new(id);
            let outcome = gateway.deactivate_profile(&id).await;
            confirm(outcome, &format!("Deactivated profile {}", id))
        }
    }
}

async fn handle_property(state: &AppState, action: PropertyAction) -> bool {
    let gateway = &state.gateway;
    match action {
        PropertyAction::List { profile } => {
            let profile = ProfileId::new(profile);
            match gateway.get_profile_properties(&profile).await {
                Outcome::Ok(properties) => {
                    print_properties(&properties);
                    true
                }
                Outcome::Failed(_) => false,
            }
        }

        PropertyAction::Add {
            profile,
            name,
            value,
        } => {
            let profile = ProfileId::new(profile);
            let outcome = gateway.add_profile_property(&profile, &name, &value).await;
            confirm(outcome, &format!("Added {} = {}", name, value))
        }

        PropertyAction::Set {
            profile,
            property,
            value,
        } => {
            let profile = ProfileId::new(profile);
            let prop = PropertyId::new(property);
            let outcome = gateway.set_profile_property(&profile, &prop, &value).await;
            confirm(outcome, &format!("Updated value to: {}", value))
        }

        PropertyAction::Rename {
            profile,
            property,
            name,
        } => {
            let profile = ProfileId::new(profile);
            let prop = PropertyId::new(property);
            let outcome = gateway
                .rename_profile_property(&profile, &prop, &name)
                .await;
            confirm(outcome, &format!("Renamed property to: {}", name))
        }

        PropertyAction::Delete { profile, property } => {
            let profile = ProfileId::new(profile);
            let prop = PropertyId::new(property);
            let outcome = gateway.delete_profile_property(&profile, &prop).await;
            confirm(outcome, &format!("Deleted property {}", prop))
        }
    }
}

async fn handle_config(state: &AppState, action: ConfigAction) -> bool {
    let gateway = &state.gateway;
    match action {
        ConfigAction::List { active_only } => {
            let outcome = gateway.get_all_properties(active_only).await;
            match outcome {
                Outcome::Ok(properties) => {
                    print_properties(&properties);
                    true
                }
                Outcome::Failed(_) => false,
            }
        }

        ConfigAction::Show { name } => {
            let outcome = gateway.get_property_details(&name).await;
            match outcome {
                Outcome::Ok(details) => {
                    print_details(&details);
                    true
                }
                Outcome::Failed(_) => false,
            }
        }
    }
}
