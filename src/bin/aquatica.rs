//! Aquatica terminal studio.

use anyhow::Context;
use aquatica::{
    AdviceModel, AspectRatio, GeminiAdviceProvider, GeminiImageProvider, ImageId, ImageModel, ImageProvider,
    ImageRecord, ServiceConfig, Session, SessionEvent,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shown while the image service keeps rejecting the credential.
const CREDENTIAL_BANNER: &str = "API Error: Check project permissions or selection.";

#[derive(Parser)]
#[command(name = "aquatica")]
#[command(about = "Design underwater 3D environment backdrops with Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON (one-shot commands)
    #[arg(long, global = true)]
    json: bool,

    /// Image model to use
    #[arg(long, value_enum, global = true, default_value = "flash")]
    model: ImageModelArg,

    /// Text model used for design advice
    #[arg(long, value_enum, global = true, default_value = "flash")]
    advice_model: AdviceModelArg,

    /// Aspect ratio of generated scenes
    #[arg(long, value_enum, global = true, default_value = "16:9")]
    aspect_ratio: AspectRatioArg,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive design session
    Studio(StudioArgs),

    /// Create (or edit) a single scene and save it
    Create(CreateArgs),

    /// Verify the API key can reach both models
    Check,
}

#[derive(Args)]
struct StudioArgs {
    /// Start from an existing image
    #[arg(short, long)]
    input: Option<PathBuf>,
}

#[derive(Args)]
struct CreateArgs {
    /// What the scene should show (or how to change the input image)
    prompt: String,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Image to edit instead of creating from scratch
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Also print design advice for the prompt
    #[arg(long)]
    advice: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ImageModelArg {
    Flash,
    Pro,
}

impl From<ImageModelArg> for ImageModel {
    fn from(arg: ImageModelArg) -> Self {
        match arg {
            ImageModelArg::Flash => ImageModel::FlashImage,
            ImageModelArg::Pro => ImageModel::ProImage,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AdviceModelArg {
    Flash,
    FlashStable,
}

impl From<AdviceModelArg> for AdviceModel {
    fn from(arg: AdviceModelArg) -> Self {
        match arg {
            AdviceModelArg::Flash => AdviceModel::Flash,
            AdviceModelArg::FlashStable => AdviceModel::FlashStable,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "1:1")]
    Square,
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "4:3")]
    Standard,
    #[value(name = "21:9")]
    Ultrawide,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Square => AspectRatio::Square,
            AspectRatioArg::Landscape => AspectRatio::Landscape,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
            AspectRatioArg::Standard => AspectRatio::Standard,
            AspectRatioArg::Ultrawide => AspectRatio::Ultrawide,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aquatica=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ServiceConfig::from_env()
        .with_image_model(cli.model.into())
        .with_advice_model(cli.advice_model.into())
        .with_aspect_ratio(cli.aspect_ratio.into());

    if config.api_key.is_empty() {
        tracing::warn!("no API_KEY or GOOGLE_API_KEY set; requests will be rejected");
    }

    match cli.command {
        Commands::Studio(args) => run_studio(config, args).await?,
        Commands::Create(args) => create_scene(config, args, cli.json).await?,
        Commands::Check => check(config, cli.json).await?,
    }

    Ok(())
}

async fn create_scene(config: ServiceConfig, args: CreateArgs, json_output: bool) -> anyhow::Result<()> {
    let mut session = Session::from_config(config);

    if let Some(ref input) = args.input {
        let bytes = std::fs::read(input)
            .with_context(|| format!("reading {}", input.display()))?;
        session.upload_base_image(bytes)?;
    }
    let base = session.active_image().map(|r| r.id);

    if !session.submit_prompt(&args.prompt) {
        anyhow::bail!("nothing to do: the prompt is empty and there is no input image");
    }
    if args.advice {
        session.settle().await;
    } else {
        settle_generation(&mut session).await;
    }

    if session.has_credential_error() {
        anyhow::bail!(CREDENTIAL_BANNER);
    }
    if let Some(err) = session.last_error() {
        anyhow::bail!("generation failed: {err}");
    }
    let scene = match session.active_image() {
        Some(scene) if Some(scene.id) != base => scene,
        _ => anyhow::bail!("the model returned no image; try rephrasing the prompt"),
    };

    scene.image.save(&args.output)?;

    if json_output {
        let result = serde_json::json!({
            "type": "image",
            "success": true,
            "id": scene.id,
            "output": args.output.display().to_string(),
            "size_bytes": scene.image.size(),
            "format": scene.image.format().extension(),
            "prompt": scene.prompt,
            "edit": base.is_some(),
            "advice": args.advice.then(|| session.advice_text()),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Saved scene: {} ({} bytes)",
            args.output.display(),
            scene.image.size()
        );
        if args.advice {
            println!("\n{}", session.advice_text());
        }
    }

    Ok(())
}

async fn check(config: ServiceConfig, json_output: bool) -> anyhow::Result<()> {
    let image = GeminiImageProvider::new(config.clone());
    let advice = GeminiAdviceProvider::new(config.clone());

    let image_status = image.health_check().await;
    let advice_status = advice.health_check().await;

    if json_output {
        let result = serde_json::json!({
            "image_model": config.image_model.as_str(),
            "image_ok": image_status.is_ok(),
            "image_error": image_status.as_ref().err().map(|e| e.to_string()),
            "advice_model": config.advice_model.as_str(),
            "advice_ok": advice_status.is_ok(),
            "advice_error": advice_status.as_ref().err().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for (label, model, status) in [
            (image.name(), config.image_model.as_str(), &image_status),
            ("Advice", config.advice_model.as_str(), &advice_status),
        ] {
            match status {
                Ok(()) => println!("  ✓ {label} ({model})"),
                Err(e) => println!("  ✗ {label} ({model}): {e}"),
            }
        }
    }

    if image_status.is_err() || advice_status.is_err() {
        anyhow::bail!("health check failed");
    }
    Ok(())
}

/// Waits for the outstanding generation only, applying any advice that
/// arrives along the way.
async fn settle_generation(session: &mut Session) {
    while session.is_generating() {
        match session.next_event().await {
            Some(event) => session.handle_event(event),
            None => break,
        }
    }
}

async fn run_studio(config: ServiceConfig, args: StudioArgs) -> anyhow::Result<()> {
    let mut session = Session::from_config(config);

    if let Some(ref input) = args.input {
        upload(&mut session, input);
    }

    println!("Aquatica 3D studio. Describe a scene, or :help for commands.");
    render(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match run_command(&mut session, line.trim()) {
                    Flow::Continue => {}
                    Flow::Render => render(&session),
                    Flow::Quit => break,
                }
            }
            Some(event) = session.next_event() => {
                let finished_generation = matches!(event, SessionEvent::GenerationFinished { .. });
                session.handle_event(event);
                if finished_generation || !session.is_fetching_advice() {
                    render(&session);
                }
            }
        }
    }

    if session.is_busy() {
        println!("Waiting for outstanding requests...");
        session.settle().await;
    }
    Ok(())
}

enum Flow {
    Continue,
    Render,
    Quit,
}

fn run_command(session: &mut Session, line: &str) -> Flow {
    let (command, rest) = match line.strip_prefix(':') {
        Some(cmd) => {
            let mut split = cmd.splitn(2, char::is_whitespace);
            (split.next().unwrap_or(""), split.next().unwrap_or("").trim())
        }
        None if line.is_empty() => return Flow::Continue,
        None => return submit(session, line),
    };

    match command {
        "q" | "quit" | "exit" => Flow::Quit,
        "h" | "help" => {
            print_help();
            Flow::Continue
        }
        "edit" => submit(session, rest),
        "upload" | "u" => {
            if rest.is_empty() {
                println!("usage: :upload <path>");
                return Flow::Continue;
            }
            upload(session, Path::new(rest));
            Flow::Render
        }
        "select" | "s" => {
            match resolve_selection(session, rest) {
                Some(id) if session.select_history_item(id) => return Flow::Render,
                _ => println!("no such iteration: {rest}"),
            }
            Flow::Continue
        }
        "history" | "ls" => {
            print_history(session);
            Flow::Continue
        }
        "advice" => {
            print_advice(session);
            Flow::Continue
        }
        "save" => {
            save_active(session, rest);
            Flow::Continue
        }
        other => {
            println!("unknown command :{other} (try :help)");
            Flow::Continue
        }
    }
}

fn submit(session: &mut Session, prompt: &str) -> Flow {
    session.set_prompt(prompt);
    if session.submit_current_prompt() {
        let verb = if session.active_image().is_some() { "Editing" } else { "Creating" };
        println!("{verb} scene...");
    } else if session.is_generating() {
        println!("Still processing the previous request.");
    } else {
        println!("Describe your underwater vision first (or :upload a base image).");
    }
    Flow::Continue
}

fn upload(session: &mut Session, path: &Path) {
    let result = std::fs::read(path)
        .map_err(aquatica::ServiceError::from)
        .and_then(|bytes| session.upload_base_image(bytes));
    match result {
        Ok(id) => tracing::debug!(%id, path = %path.display(), "uploaded"),
        Err(e) => println!("Could not use {} as a base image: {e}", path.display()),
    }
}

/// Accepts a 1-based history position or a full record id.
fn resolve_selection(session: &Session, arg: &str) -> Option<ImageId> {
    if let Ok(n) = arg.parse::<usize>() {
        return session.history().get(n.checked_sub(1)?).map(|r| r.id);
    }
    arg.parse().ok()
}

fn save_active(session: &Session, path: &str) {
    let Some(active) = session.active_image() else {
        println!("No scene active.");
        return;
    };
    let path = if path.is_empty() {
        PathBuf::from(format!("aquatica-{}.{}", active.id, active.image.format().extension()))
    } else {
        PathBuf::from(path)
    };
    match active.image.save(&path) {
        Ok(()) => println!("Saved {}", path.display()),
        Err(e) => println!("Could not save {}: {e}", path.display()),
    }
}

fn render(session: &Session) {
    println!();
    if session.has_credential_error() {
        println!("!! {CREDENTIAL_BANNER}");
    }
    if let Some(err) = session.last_error() {
        println!("!! Generation failed: {err}");
    }

    match session.active_image() {
        Some(active) => println!("Scene: {}", describe(active)),
        None => println!(
            "No Scene Active. Generate a conceptual background or :upload an existing asset."
        ),
    }
    if session.is_generating() {
        println!("   Processing environment...");
    }

    print_history(session);
    print_advice(session);
}

fn print_history(session: &Session) {
    println!("Design iterations:");
    if session.history().is_empty() {
        println!("   No iterations yet...");
        return;
    }
    let active = session.active_image().map(|r| r.id);
    for (i, record) in session.history().iter().enumerate() {
        let marker = if Some(record.id) == active { '*' } else { ' ' };
        println!(" {marker} {:>2}. {}", i + 1, describe(record));
    }
}

fn print_advice(session: &Session) {
    println!("Expert technical guidance:");
    if session.is_fetching_advice() {
        println!("   (fetching...)");
    } else if session.advice_text().is_empty() {
        println!("   Generate a concept to receive professional 3D implementation advice.");
    } else {
        for line in session.advice_text().lines() {
            println!("   {line}");
        }
    }
}

fn describe(record: &ImageRecord) -> String {
    let source = if record.is_upload() { "upload, " } else { "" };
    format!(
        "\"{}\" ({}{}, {} KB, {})",
        record.prompt,
        source,
        record.image.format().extension(),
        record.image.size().div_ceil(1024),
        record.created_at.format("%H:%M:%S"),
    )
}

fn print_help() {
    println!(
        "\
Type a description to create a scene, or to edit the active one.
  :edit [text]      edit the active scene (text optional)
  :upload <path>    use an image file as the new base
  :select <n|id>    make an earlier iteration active
  :history          list iterations
  :advice           show the latest advice
  :save [path]      save the active scene
  :quit"
    );
}
