use adforge::config::Config;
use adforge::dispatcher::{AdDispatch, SectionDispatch};
use adforge::gateway::DiscoveryRequest;
use adforge::orchestrator::Orchestrator;
use adforge::session::{AspectRatio, Phase, Session};
use adforge::storage::SessionStore;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Generate marketing creatives from a product URL or image
#[derive(Parser)]
#[command(name = "adforge")]
#[command(about = "AI marketing-creative generation pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Session id to operate on (default: most recent)
    #[arg(short = 's', long, global = true)]
    session: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover product DNA from a URL or image; starts a fresh pipeline
    Discover {
        /// Product page URL
        url: Option<String>,
        /// Base64-encoded product image instead of a URL
        #[arg(long, conflicts_with = "url")]
        image_base64: Option<String>,
    },
    /// Recommend three creative strategy packages
    Recommend,
    /// Design the landing structure for a creative path
    Design {
        /// Index of the creative path to use (0-2)
        path_index: usize,
    },
    /// Select the working section or the style reference
    Select {
        #[command(subcommand)]
        command: SelectCommands,
    },
    /// Switch between the landing and ads surfaces
    Phase {
        /// Target phase: landing or ads
        phase: String,
    },
    /// Generate one landing section
    Generate {
        section_id: String,
        /// Edit the existing output instead of generating fresh
        #[arg(long)]
        correction: bool,
        /// Manual generation instructions
        #[arg(long)]
        instructions: Option<String>,
        /// Aspect ratio: 16:9, 9:16, 1:1, or 4:5
        #[arg(long, default_value = "16:9")]
        aspect_ratio: String,
        /// Explicit style-reference image URL
        #[arg(long)]
        reference: Option<String>,
    },
    /// Ad creative pipeline
    Ads {
        #[command(subcommand)]
        command: AdsCommands,
    },
    /// Render a short video from a completed section image
    Video {
        section_id: String,
        #[arg(long)]
        instructions: Option<String>,
    },
    /// Queue and generate every unfinished section and ad
    Autopilot {
        #[command(subcommand)]
        command: AutopilotCommands,
    },
    /// One conversational turn with the creative agent
    Chat {
        message: String,
    },
    /// Manage stored sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
}

#[derive(Subcommand)]
enum SelectCommands {
    /// Select the working section
    Section { section_id: String },
    /// Select the style-reference image
    Reference { url: String },
}

#[derive(Subcommand)]
enum AdsCommands {
    /// Propose ad concepts for the selected creative path
    Concepts,
    /// Generate one ad creative
    Generate {
        concept_id: String,
        #[arg(long)]
        correction: bool,
        #[arg(long)]
        instructions: Option<String>,
        #[arg(long, default_value = "1:1")]
        aspect_ratio: String,
        #[arg(long)]
        reference: Option<String>,
    },
}

#[derive(Subcommand)]
enum AutopilotCommands {
    /// Start unattended generation and wait for the queue to drain
    Start,
    /// Stop unattended generation; the in-flight job still settles
    Stop,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List stored sessions
    List,
    /// Show the current session state
    Show,
    /// Reset the current session to its initial state
    Reset,
    /// Delete a stored session
    Delete { id: String },
}

fn parse_aspect_ratio(value: &str) -> Result<AspectRatio> {
    match value {
        "16:9" => Ok(AspectRatio::Landscape),
        "9:16" => Ok(AspectRatio::Portrait),
        "1:1" => Ok(AspectRatio::Square),
        "4:5" => Ok(AspectRatio::Vertical),
        other => Err(anyhow!(
            "unsupported aspect ratio '{}': expected 16:9, 9:16, 1:1, or 4:5",
            other
        )),
    }
}

fn print_notices(session: &Session) {
    if let Some(error) = &session.error {
        eprintln!("error: {}", error);
    }
    if let Some(success) = &session.success {
        println!("{}", success);
    }
}

fn print_session(session: &Session) {
    println!("session {} ({:?})", session.id, session.phase());
    if let Some(product) = &session.product_data {
        println!("  product: {} — {}", product.name, product.angle);
    }
    if !session.creative_paths.is_empty() {
        println!("  creative paths:");
        for (i, path) in session.creative_paths.iter().enumerate() {
            let marker = if session.selected_path == Some(i) { "*" } else { " " };
            println!("  {} [{}] {}: {}", marker, i, path.package.name, path.justification);
        }
    }
    if let Some(structure) = &session.landing.proposed_structure {
        println!("  sections:");
        for section in &structure.sections {
            let status = session
                .landing
                .generations
                .get(&section.section_id)
                .map(|g| format!("{:?}", g.status))
                .unwrap_or_else(|| "NotStarted".to_string());
            println!("    {} — {} [{}]", section.section_id, section.title, status);
        }
    }
    if !session.landing.ad_concepts.is_empty() {
        println!("  ad concepts:");
        for concept in &session.landing.ad_concepts {
            let status = session
                .landing
                .ad_generations
                .get(&concept.concept_id)
                .map(|g| format!("{:?}", g.status))
                .unwrap_or_else(|| "NotStarted".to_string());
            println!("    {} — {} [{}]", concept.concept_id, concept.title, status);
        }
    }
    if let Some(credits) = session.credits {
        println!("  credits: {}", credits);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let store = SessionStore::open_default()?;

    // Session management commands that do not need the gateway.
    if let Commands::Session { ref command } = cli.command {
        match command {
            SessionCommands::List => {
                for summary in store.list().await? {
                    println!(
                        "{}  {:?}  {}  {}",
                        summary.id,
                        summary.phase,
                        summary.product_name.as_deref().unwrap_or("-"),
                        summary.updated_at.format("%Y-%m-%d %H:%M")
                    );
                }
                return Ok(());
            }
            SessionCommands::Delete { id } => {
                store.delete(id).await?;
                println!("deleted session {}", id);
                return Ok(());
            }
            _ => {}
        }
    }

    let session = match &cli.session {
        Some(id) => store.load(id).await?,
        None => store.load_latest().await?.unwrap_or_default(),
    };
    debug!(session_id = %session.id, "operating on session");

    let orchestrator = Orchestrator::from_config(&config, session, Some(store))?;

    match cli.command {
        Commands::Discover { url, image_base64 } => {
            let request = match (url, image_base64) {
                (Some(url), None) => DiscoveryRequest::from_url(url),
                (None, Some(image)) => DiscoveryRequest::from_image(image),
                _ => return Err(anyhow!("provide a URL or --image-base64")),
            };
            orchestrator.discover(request).await?;
        }
        Commands::Recommend => {
            orchestrator.get_creative_recommendations().await?;
        }
        Commands::Design { path_index } => {
            orchestrator.generate_landing_proposal(path_index).await?;
        }
        Commands::Select { command } => match command {
            SelectCommands::Section { section_id } => {
                orchestrator.select_section(Some(section_id)).await?;
            }
            SelectCommands::Reference { url } => {
                orchestrator.select_reference(Some(url)).await?;
            }
        },
        Commands::Phase { phase } => {
            let phase = match phase.as_str() {
                "landing" => Phase::Landing,
                "ads" => Phase::Ads,
                other => return Err(anyhow!("unknown phase '{}'", other)),
            };
            orchestrator.set_phase(phase).await?;
        }
        Commands::Generate {
            section_id,
            correction,
            instructions,
            aspect_ratio,
            reference,
        } => {
            let dispatch = SectionDispatch {
                section_id,
                is_correction: correction,
                extra_instructions: instructions,
                aspect_ratio: parse_aspect_ratio(&aspect_ratio)?,
                reference_url: reference,
                placeholder_copy: false,
            };
            orchestrator.generate_section(dispatch).await?;
        }
        Commands::Ads { command } => match command {
            AdsCommands::Concepts => {
                orchestrator.get_ad_concepts().await?;
            }
            AdsCommands::Generate {
                concept_id,
                correction,
                instructions,
                aspect_ratio,
                reference,
            } => {
                let dispatch = AdDispatch {
                    concept_id,
                    is_correction: correction,
                    extra_instructions: instructions,
                    aspect_ratio: parse_aspect_ratio(&aspect_ratio)?,
                    reference_url: reference,
                    placeholder_copy: false,
                    omit_reference: false,
                };
                orchestrator.generate_ad_image(dispatch).await?;
            }
        },
        Commands::Video {
            section_id,
            instructions,
        } => {
            orchestrator.generate_video(&section_id, instructions).await?;
        }
        Commands::Autopilot { command } => match command {
            AutopilotCommands::Start => {
                orchestrator.start_auto_generation().await?;
            }
            AutopilotCommands::Stop => {
                orchestrator.stop_auto_generation().await?;
            }
        },
        Commands::Chat { message } => {
            if let Some(reply) = orchestrator.chat(message).await? {
                println!("{}", reply);
            }
        }
        Commands::Session { command } => match command {
            SessionCommands::Show => {
                print_session(&orchestrator.snapshot().await);
            }
            SessionCommands::Reset => {
                orchestrator.reset_discovery().await?;
                println!("session reset");
            }
            // List and Delete were handled before the orchestrator existed.
            _ => {}
        },
    }

    print_notices(&orchestrator.snapshot().await);
    Ok(())
}
