use std::path::{Path, PathBuf};
use std::sync::Arc;

use cyder_tools::log::{error, info, LocalLogger};
use og_prompts::config::CONFIG;
use og_prompts::database::api_key::ApiKeyRepository;
use og_prompts::database::{RestStore, SharedToken};
use og_prompts::error::BaseError;
use og_prompts::router::resolve_navigation;
use og_prompts::service::ai::analysis::{RateMeTask, StyleTask};
use og_prompts::service::ai::key_pool::KeySource;
use og_prompts::service::ai::{ImageAnalyzer, ImageInput, KeyAdmin};
use og_prompts::service::prefs::onboarding::OnboardingFlags;
use og_prompts::service::prefs::usage::{DailyUsage, UsageFeature};
use og_prompts::service::prefs::{FileKv, KeyValueStore};
use og_prompts::service::session::SessionSnapshot;
use og_prompts::utils::clipboard::{copy_text, CommandClipboard, StagingClipboard};
use og_prompts::utils::image::compress_image;

fn print_help() {
    println!(
        r#"
Usage: og-prompts <COMMAND>

Commands:
  rate-me <image>                 Scores a portrait and prints the roast and toast.
  extract-style <image> [--copy]  Describes an image's style; --copy puts the suggested prompt on the clipboard.
  route <path>                    Shows where a first-time, signed-out visitor to <path> ends up.
  keys                            Lists the AI key pool, masked.
  keys add <key>                  Stores a new provider key in the backend.
  keys enable|disable <id>        Turns a stored key on or off.
  keys remove <id>                Deletes a stored key.
"#
    );
}

fn key_repository() -> Result<ApiKeyRepository, BaseError> {
    if CONFIG.backend.url.is_empty() {
        return Err(BaseError::ParamInvalid(Some("backend.url is not configured".to_string())));
    }
    let store = RestStore::new(&CONFIG.backend, SharedToken::default())?;
    Ok(ApiKeyRepository::new(Arc::new(store)))
}

fn key_source() -> Option<Arc<dyn KeySource>> {
    if CONFIG.backend.url.is_empty() {
        return None;
    }
    match key_repository() {
        Ok(repo) => Some(Arc::new(repo)),
        Err(e) => {
            error!("backend unavailable, using configured keys only: {}", e);
            None
        }
    }
}

fn local_store() -> Result<Arc<dyn KeyValueStore>, BaseError> {
    Ok(Arc::new(FileKv::open(&CONFIG.client.local_store_path)?))
}

async fn load_image(path: &Path) -> Result<ImageInput, BaseError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| BaseError::ParamInvalid(Some(format!("cannot read {}: {}", path.display(), e))))?;
    let prepared = compress_image(bytes, CONFIG.storage.max_image_edge).await;
    Ok(ImageInput::from_bytes(&prepared.bytes, prepared.mime))
}

/// Free-trial counter; fails before any image work once today's quota is gone.
fn usage_counter(feature: UsageFeature) -> Result<DailyUsage, BaseError> {
    let usage = DailyUsage::new(
        local_store()?,
        CONFIG.client.free_trial_daily_limit,
        CONFIG.timezone(),
    );
    if usage.remaining(feature)? == 0 {
        return Err(BaseError::LimitReached(None));
    }
    Ok(usage)
}

async fn cmd_rate_me(path: PathBuf) -> Result<(), BaseError> {
    let usage = usage_counter(UsageFeature::RateMe)?;
    let image = load_image(&path).await?;
    let analyzer = ImageAnalyzer::new(CONFIG.ai.clone(), key_source())?;
    let analysis = analyzer.analyze(&RateMeTask, &image).await?;
    let remaining = usage.consume(UsageFeature::RateMe)?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    info!("{} free ratings left today", remaining);
    Ok(())
}

async fn cmd_extract_style(path: PathBuf, copy: bool) -> Result<(), BaseError> {
    let usage = usage_counter(UsageFeature::StyleExtractor)?;
    let image = load_image(&path).await?;
    let analyzer = ImageAnalyzer::new(CONFIG.ai.clone(), key_source())?;
    let analysis = analyzer.analyze(&StyleTask, &image).await?;
    let remaining = usage.consume(UsageFeature::StyleExtractor)?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    info!("{} free style extractions left today", remaining);

    if copy {
        let primary = if cfg!(target_os = "macos") {
            CommandClipboard::new("pbcopy", &[])
        } else {
            CommandClipboard::new("wl-copy", &[])
        };
        let fallback = StagingClipboard::new(
            CommandClipboard::new("xclip", &["-selection", "clipboard"]),
            std::env::temp_dir(),
        );
        let outcome = copy_text(&primary, &fallback, &analysis.suggested_prompt).await?;
        info!("suggested prompt copied ({:?})", outcome);
    }
    Ok(())
}

fn cmd_route(path: &str) -> Result<(), BaseError> {
    let flags = OnboardingFlags::new(local_store()?);
    let navigation = resolve_navigation(path, &SessionSnapshot::default(), &flags)?;
    println!("{:?}", navigation);
    Ok(())
}

async fn cmd_key_admin(action: &str, arg: &str) -> Result<(), BaseError> {
    let repo = key_repository()?;
    let analyzer = Arc::new(ImageAnalyzer::new(CONFIG.ai.clone(), Some(Arc::new(repo.clone())))?);
    let admin = KeyAdmin::new(repo, analyzer);
    match action {
        "add" => {
            let row = admin.add(arg, None).await?;
            println!("added {}", row.id.unwrap_or_default());
        }
        "enable" => admin.set_active(arg, true).await?,
        "disable" => admin.set_active(arg, false).await?,
        "remove" => admin.remove(arg).await?,
        other => return Err(BaseError::ParamInvalid(Some(format!("unknown keys action '{}'", other)))),
    }
    Ok(())
}

async fn cmd_keys() -> Result<(), BaseError> {
    let analyzer = ImageAnalyzer::new(CONFIG.ai.clone(), key_source())?;
    let keys = analyzer.pool().describe().await;
    if keys.is_empty() {
        println!("no keys configured");
    }
    for (i, key) in keys.iter().enumerate() {
        println!("{:>2}  {}", i, key);
    }
    Ok(())
}

async fn run(mut args: pico_args::Arguments) -> Result<(), BaseError> {
    let subcommand = args
        .subcommand()
        .map_err(|e| BaseError::ParamInvalid(Some(e.to_string())))?
        .unwrap_or_default();
    let copy = args.contains("--copy");
    let free: Vec<String> = args
        .finish()
        .into_iter()
        .filter_map(|s| s.into_string().ok())
        .collect();

    match (subcommand.as_str(), free.as_slice()) {
        ("rate-me", [image]) => cmd_rate_me(PathBuf::from(image)).await,
        ("extract-style", [image]) => cmd_extract_style(PathBuf::from(image), copy).await,
        ("route", [path]) => cmd_route(path),
        ("keys", []) => cmd_keys().await,
        ("keys", [action, arg]) => cmd_key_admin(action, arg).await,
        _ => {
            print_help();
            Err(BaseError::ParamInvalid(Some(format!("unknown command '{}'", subcommand))))
        }
    }
}

#[tokio::main]
async fn main() {
    LocalLogger::init(&CONFIG.log_level);
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print_help();
        return;
    }
    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
}
