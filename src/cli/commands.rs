//! CLI command handlers

use std::path::PathBuf;

use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::app::{
    DownloadRequest, Downloader, ScriptClient, ScriptRegistry, UserScript,
};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

use super::args::{GlobalArgs, InstallArgs, ListArgs, ScriptRefArgs, ShowArgs, UpdateArgs};
use super::progress::ProgressDisplay;

/// Shared setup for every command: config, client, registry
struct CommandContext {
    client: ScriptClient,
    registry: ScriptRegistry,
    quiet: bool,
}

impl CommandContext {
    async fn new(global: &GlobalArgs) -> Result<Self> {
        let config = AppConfig::load(global.config.as_deref())?;
        let client = ScriptClient::with_config(&config.client.to_client_config())?;

        let root: PathBuf = global
            .storage_dir
            .clone()
            .unwrap_or_else(|| config.storage.effective_root());
        let registry = ScriptRegistry::open(&root).await?;

        Ok(Self {
            client,
            registry,
            quiet: global.quiet,
        })
    }

    /// Resolve a script reference: uuid first, then namespace/name id
    async fn resolve(&self, reference: &str) -> Result<UserScript> {
        if let Ok(uuid) = Uuid::parse_str(reference) {
            if let Some(script) = self.registry.get(&uuid).await {
                return Ok(script);
            }
        }
        self.registry
            .find_by_id(reference)
            .await
            .ok_or_else(|| AppError::generic(format!("no installed script matches {reference:?}")))
    }

    /// Run one attempt to completion with progress display and hand off
    async fn run_install(&self, request: DownloadRequest) -> Result<Uuid> {
        let downloader = Downloader::new(self.client.clone(), request);
        downloader.start();

        let display = ProgressDisplay::new(ProgressDisplay::should_enable(self.quiet));
        display.run(&downloader).await;

        let uuid = downloader.install(&self.registry).await?;
        let metadata = downloader.metadata().await?;
        println!("Installed {:?} ({})", metadata.name, uuid);
        Ok(uuid)
    }
}

/// Handle the install command
pub async fn handle_install(args: InstallArgs, global: &GlobalArgs) -> Result<()> {
    let context = CommandContext::new(global).await?;

    let request = match (&args.file, &args.url) {
        (Some(file), _) => {
            let content = tokio::fs::read_to_string(file).await?;
            let mut request = DownloadRequest::from_content(content);
            if let Some(origin) = &args.origin {
                request = request.with_origin(parse_url(origin)?);
            }
            request
        }
        (None, Some(url)) => DownloadRequest::from_url(parse_url(url)?),
        (None, None) => return Err(AppError::generic("install needs a URL or --file")),
    };

    context.run_install(request).await?;
    Ok(())
}

/// Handle the update command
///
/// Re-downloads an installed script from its recorded source URL, supplying
/// the stored icon, dependencies and resources as known assets so unchanged
/// URLs are not fetched again.
pub async fn handle_update(args: UpdateArgs, global: &GlobalArgs) -> Result<()> {
    let context = CommandContext::new(global).await?;
    let script = context.resolve(&args.script).await?;

    let source = script.source_url.as_deref().ok_or_else(|| {
        AppError::generic(format!(
            "script {:?} was installed from local content and has no source URL",
            script.name
        ))
    })?;
    let url = parse_url(source)?;

    info!("Updating {:?} from {}", script.name, url);
    let request = DownloadRequest::from_url(url).with_known_assets(script.known_assets());
    context.run_install(request).await?;
    Ok(())
}

/// Handle the list command
pub async fn handle_list(args: ListArgs, global: &GlobalArgs) -> Result<()> {
    let context = CommandContext::new(global).await?;
    let scripts = context.registry.list(args.all).await;

    if scripts.is_empty() {
        println!("No installed scripts");
        return Ok(());
    }

    for script in scripts {
        let state = if script.enabled { "enabled" } else { "disabled" };
        let version = script.version.as_deref().unwrap_or("-");
        println!("{}  {:40}  {:8}  {}", script.uuid, script.id, version, state);
    }
    Ok(())
}

/// Handle the show command
pub async fn handle_show(args: ShowArgs, global: &GlobalArgs) -> Result<()> {
    let context = CommandContext::new(global).await?;
    let script = context.resolve(&args.script).await?;

    println!("Name:        {}", script.name);
    println!("Namespace:   {}", script.namespace);
    println!("UUID:        {}", script.uuid);
    if let Some(version) = &script.version {
        println!("Version:     {version}");
    }
    if let Some(description) = &script.description {
        println!("Description: {description}");
    }
    if let Some(source) = &script.source_url {
        println!("Source:      {source}");
    }
    println!("Enabled:     {}", script.enabled);
    println!("Installed:   {}", script.installed_at.to_rfc3339());
    println!("Updated:     {}", script.updated_at.to_rfc3339());
    println!("Size:        {} bytes", script.content.len());

    if let Some(icon) = &script.icon {
        println!("Icon:        {} ({} bytes)", icon.url, icon.content.len());
    }
    if !script.requires.is_empty() {
        println!("Requires:");
        for dep in &script.requires {
            println!("  {} ({} bytes)", dep.url, dep.content.len());
        }
    }
    if !script.resources.is_empty() {
        println!("Resources:");
        let mut names: Vec<_> = script.resources.keys().collect();
        names.sort();
        for name in names {
            let resource = &script.resources[name];
            println!("  {} = {} ({} bytes)", name, resource.url, resource.content.len());
        }
    }
    Ok(())
}

/// Handle the enable/disable commands
pub async fn handle_set_enabled(
    args: ScriptRefArgs,
    global: &GlobalArgs,
    enabled: bool,
) -> Result<()> {
    let context = CommandContext::new(global).await?;
    let script = context.resolve(&args.script).await?;
    context.registry.set_enabled(&script.uuid, enabled).await?;
    println!(
        "{} {:?}",
        if enabled { "Enabled" } else { "Disabled" },
        script.name
    );
    Ok(())
}

/// Handle the uninstall command
pub async fn handle_uninstall(args: ScriptRefArgs, global: &GlobalArgs) -> Result<()> {
    let context = CommandContext::new(global).await?;
    let script = context.resolve(&args.script).await?;
    context.registry.uninstall(&script.uuid).await?;
    println!("Uninstalled {:?}", script.name);
    Ok(())
}

fn parse_url(value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| AppError::generic(format!("invalid URL {value:?}: {e}")))
}
