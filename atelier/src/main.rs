#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::path::{Path, PathBuf};

use anyhow::Context;
use args::{Args, Command, KeyCommand};
use atelier_config::Config;
use atelier_core::{AspectRatio, GenerationRequest, GenerationResult, InputImage};
use atelier_keys::{KeySession, KeyStore, RpcKeyStore};
use atelier_providers::Generator;
use clap::Parser;
use secrecy::{ExposeSecret, SecretString};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    atelier_telemetry::init(&config.telemetry, args.log.as_deref())?;

    tracing::debug!(config_path = %args.config.display(), "configuration loaded");

    tokio::select! {
        result = run(args, config) => result,
        () = interrupted() => anyhow::bail!("interrupted"),
    }
}

async fn run(args: Args, config: Config) -> anyhow::Result<()> {
    let generator = Generator::from_config(&config)?;
    let mut session = KeySession::from_config(&config)?;

    match args.command {
        Command::Text { prompt, schema } => {
            if let Some(user) = &args.user {
                session.use_custom(&key_store(&config)?, user).await?;
            }

            let schema = match schema {
                Some(path) => Some(read_schema(&path).await?),
                None => None,
            };

            let key = session.resolve();
            let text = generator.generate_text(&key, &prompt, schema.as_ref()).await?;

            println!("{text}");
            if key.requires_usage_marker() {
                eprintln!("{}", generator.usage_marker());
            }
        }
        Command::Image {
            prompt,
            inputs,
            aspect_ratio,
            output,
        } => {
            if let Some(user) = &args.user {
                session.use_custom(&key_store(&config)?, user).await?;
            }

            let request = image_request(prompt, &inputs, aspect_ratio).await?;
            let generation = generator.generate(&session.resolve(), &request).await?;

            match &generation.result {
                GenerationResult::Image(image) => {
                    let bytes = image.decode().context("provider returned an invalid image payload")?;
                    tokio::fs::write(&output, bytes)
                        .await
                        .with_context(|| format!("failed to write {}", output.display()))?;

                    println!("{}", output.display());
                    if generation.requires_usage_marker() {
                        eprintln!("{}", generator.usage_marker());
                    }
                }
                GenerationResult::Text(text) => println!("{text}"),
                GenerationResult::Empty => {
                    eprintln!("{} returned no image. Try rephrasing the prompt.", generation.provider.display_name());
                }
            }
        }
        Command::ValidateKey { provider, key } => {
            let validation = generator.validate_api_key(provider, &key).await;
            println!("{}", serde_json::to_string_pretty(&validation)?);
        }
        Command::Key(command) => {
            let user = args.user.as_deref().context("key commands need --user")?;
            let store = key_store(&config)?;
            manage_key(command, &store, &mut session, user).await?;
        }
    }

    Ok(())
}

async fn manage_key(
    command: KeyCommand,
    store: &dyn KeyStore,
    session: &mut KeySession,
    user: &str,
) -> anyhow::Result<()> {
    match command {
        KeyCommand::Show => match store.get_key(user).await? {
            Some(key) => println!("{} {}", key.provider, masked(key.api_key.expose_secret())),
            None => println!("no saved key, using the bundled default"),
        },
        KeyCommand::Set { provider, key } => {
            session
                .save_custom(store, user, provider, SecretString::from(key))
                .await?;
            println!("saved {provider} key for {user}");
        }
        KeyCommand::Clear => {
            session.clear_custom(store, user).await?;
            println!("cleared saved key for {user}");
        }
    }

    Ok(())
}

fn key_store(config: &Config) -> anyhow::Result<RpcKeyStore> {
    let store_config = config
        .key_store
        .as_ref()
        .context("a [key_store] section is required for user keys")?;

    Ok(RpcKeyStore::from_config(store_config)?)
}

async fn read_schema(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read schema {}", path.display()))?;

    serde_json::from_str(&raw).with_context(|| format!("schema {} is not valid JSON", path.display()))
}

async fn image_request(
    prompt: String,
    inputs: &[PathBuf],
    aspect_ratio: Option<AspectRatio>,
) -> anyhow::Result<GenerationRequest> {
    let mut request = GenerationRequest::new(prompt);

    for path in inputs {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read input image {}", path.display()))?;

        let name = path
            .file_name()
            .map_or_else(|| "image".to_owned(), |name| name.to_string_lossy().into_owned());

        request = request.with_image(InputImage::new(bytes, mime_type(path)?, name));
    }

    if let Some(aspect_ratio) = aspect_ratio {
        request = request.with_aspect_ratio(aspect_ratio);
    }

    Ok(request)
}

fn mime_type(path: &Path) -> anyhow::Result<&'static str> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("png") => Ok("image/png"),
        Some("jpg" | "jpeg") => Ok("image/jpeg"),
        Some("webp") => Ok("image/webp"),
        Some("gif") => Ok("image/gif"),
        _ => anyhow::bail!("unsupported input image {}, use PNG, JPEG, WebP, or GIF", path.display()),
    }
}

/// Last four characters only
fn masked(key: &str) -> String {
    let start = key.char_indices().rev().nth(3).map_or(0, |(index, _)| index);
    format!("****{}", &key[start..])
}

/// Resolve on `SIGINT` or `SIGTERM`
async fn interrupted() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
