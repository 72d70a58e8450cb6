//! Command-line interface definition and command execution.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use viewforge::{DirSource, ViewConfig, ViewManager};

/// Config file picked up from the view directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "views.yaml";

/// Render layout-aware views from a template directory.
#[derive(Debug, Parser)]
#[command(name = "viewforge", version, about)]
pub struct Cli {
    /// Directory holding the views
    #[arg(short, long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// YAML configuration file (defaults to `views.yaml` in the view directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render a view to stdout
    Render(RenderArgs),
    /// List the files a view is composed of, in order
    Files(Target),
}

/// Which composition to use.
#[derive(Debug, Args)]
pub struct Target {
    /// View name, e.g. `site/index`
    pub view: String,

    /// Layout to wrap the view in (defaults to the configured default layout)
    #[arg(short, long, conflicts_with = "partial")]
    pub layout: Option<String>,

    /// Render the view on its own, without a layout
    #[arg(short, long)]
    pub partial: bool,
}

impl Target {
    /// Resolves the layout name, `None` meaning no layout.
    fn layout<'a>(&'a self, config: &'a ViewConfig) -> Option<&'a str> {
        if self.partial {
            None
        } else {
            Some(self.layout.as_deref().unwrap_or(&config.default_layout))
        }
    }
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub target: Target,

    /// JSON file with the render data, `-` for stdin
    #[arg(long, conflicts_with = "json")]
    pub data: Option<PathBuf>,

    /// Inline JSON render data
    #[arg(long)]
    pub json: Option<String>,
}

impl Cli {
    /// Default log filter for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Runs the selected command, writing results to `out`.
    pub fn execute(&self, out: &mut dyn Write) -> Result<()> {
        let config = self.load_config()?;
        let manager = ViewManager::new(DirSource::new(&self.dir), config);
        tracing::debug!(
            dir = %self.dir.display(),
            layouts = ?manager.layouts().names(),
            "view manager ready"
        );

        match &self.command {
            Command::Render(args) => render(&manager, args, out),
            Command::Files(target) => files(&manager, target, out),
        }
    }

    fn load_config(&self) -> Result<ViewConfig> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => {
                let path = self.dir.join(DEFAULT_CONFIG_FILE);
                if !path.is_file() {
                    tracing::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                    return Ok(ViewConfig::default());
                }
                path
            }
        };
        ViewConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))
    }
}

fn render(manager: &ViewManager, args: &RenderArgs, out: &mut dyn Write) -> Result<()> {
    let data = load_data(args)?;
    let target = &args.target;
    let layout = target.layout(manager.config());

    let rendered = match layout {
        Some(layout) => manager.render_layout(out, layout, &target.view, &data),
        None => manager.render_partial(out, &target.view, &data),
    };
    rendered.with_context(|| format!("failed to render view '{}'", target.view))?;

    out.flush().context("failed to flush output")?;
    Ok(())
}

fn files(manager: &ViewManager, target: &Target, out: &mut dyn Write) -> Result<()> {
    let layout = target.layout(manager.config());
    let files = manager
        .files(layout, &target.view)
        .with_context(|| format!("failed to resolve view '{}'", target.view))?;

    for file in files {
        writeln!(out, "{}\t{}", file.role, file.path)?;
    }
    Ok(())
}

fn load_data(args: &RenderArgs) -> Result<serde_json::Value> {
    if let Some(json) = &args.json {
        return serde_json::from_str(json).context("invalid --json data");
    }
    match args.data.as_deref() {
        None => Ok(serde_json::Value::Object(Default::default())),
        Some(path) if path == Path::new("-") => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("failed to read data from stdin")?;
            serde_json::from_str(&input).context("invalid JSON data on stdin")
        }
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read data file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("invalid JSON in {}", path.display()))
        }
    }
}
