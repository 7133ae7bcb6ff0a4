//! Plugin Publisher CLI
//!
//! Container image publishing and plugin release tooling for CI jobs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plugin_publisher::core::{
    ConfigFile, ConfigLoadOptions, ConfigLoader, PublishConfig, PublishError, RegistryTargets,
    TriggerContext,
};
use plugin_publisher::{
    BuildDescriptor, ImagePublisher, PublishPlan, PublishPlanner, ReleaseEnvironment,
    ReleaseUploader, SafeCommandExecutor, SecureTokenManager,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Container image publishing and plugin release tooling
#[derive(Parser)]
#[command(name = "plugin-publisher")]
#[command(version = "0.1.0")]
#[command(about = "Container image publishing and plugin release tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and publish the container image for this pipeline
    Image {
        /// Build context (overrides dockerfileContext)
        #[arg(long)]
        context: Option<String>,

        /// Config file (defaults to ./.plugin-publisher.yaml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the commands instead of running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the publish plan for this pipeline as JSON
    Plan {
        /// Config file (defaults to ./.plugin-publisher.yaml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Prepare release notes and upload the plugin jar
    Release {
        /// Plugin project directory (defaults to CI_PROJECT_DIR)
        #[arg(long)]
        project_dir: Option<PathBuf>,

        /// Release version (defaults to CI_COMMIT_TAG)
        #[arg(long)]
        version: Option<String>,

        /// Only write the release notes
        #[arg(long)]
        skip_upload: bool,
    },

    /// Work with the shared parent build descriptor
    Descriptor {
        #[command(subcommand)]
        action: DescriptorAction,
    },
}

#[derive(Subcommand)]
enum DescriptorAction {
    /// Render the parent descriptor as pom.xml
    Render {
        /// YAML descriptor definition (defaults to the built-in parent)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the parent descriptor
    Check {
        /// YAML descriptor definition (defaults to the built-in parent)
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plugin_publisher=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            if let Some(error) = e.downcast_ref::<PublishError>() {
                for action in error.suggested_actions() {
                    eprintln!("  - {}", action);
                }
            }
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let env: HashMap<String, String> = std::env::vars().collect();

    match cli.command {
        Commands::Image {
            context,
            config,
            dry_run,
        } => image_command(env, context, config, dry_run).await,
        Commands::Plan { config } => plan_command(env, config).await,
        Commands::Release {
            project_dir,
            version,
            skip_upload,
        } => release_command(env, project_dir, version, skip_upload).await,
        Commands::Descriptor { action } => match action {
            DescriptorAction::Render { input, output } => render_command(input, output).await,
            DescriptorAction::Check { input } => check_command(input).await,
        },
    }
}

async fn load_config(
    env: &HashMap<String, String>,
    config_file: Option<PathBuf>,
    context: Option<String>,
) -> Result<PublishConfig> {
    let cli_args = context.map(|dockerfile_context| ConfigFile {
        dockerfile_context: Some(dockerfile_context),
        ..ConfigFile::default()
    });

    let config = ConfigLoader::load(ConfigLoadOptions {
        project_path: PathBuf::from("."),
        config_file,
        cli_args,
        env: env.clone(),
    })
    .await?;

    Ok(config)
}

fn build_plan(
    env: &HashMap<String, String>,
    config: &PublishConfig,
    targets: &RegistryTargets,
) -> Result<PublishPlan> {
    let trigger = TriggerContext::from_env(env)?;
    let plan = PublishPlanner::new(config, targets).plan(&trigger)?;
    Ok(plan)
}

async fn image_command(
    env: HashMap<String, String>,
    context: Option<String>,
    config_file: Option<PathBuf>,
    dry_run: bool,
) -> Result<i32> {
    println!("\n🐳 plugin-publisher image\n");

    let config = load_config(&env, config_file, context).await?;
    let targets = RegistryTargets::from_env(&env)?;
    let tokens = SecureTokenManager::from_env(&env);
    let plan = build_plan(&env, &config, &targets)?;

    if plan.is_empty() {
        println!("Nothing to publish for this pipeline");
        return Ok(0);
    }

    if dry_run {
        println!("Dry run, {} step(s):", plan.steps.len());
        for line in plan.dry_run_lines(&tokens) {
            println!("  {}", line);
        }
        return Ok(0);
    }

    let executor =
        SafeCommandExecutor::new(".")?.with_masking(SecureTokenManager::from_env(&env));
    let publisher = ImagePublisher::new(Arc::new(executor), targets, tokens);
    let report = publisher.run(&plan).await?;

    if !report.tolerated_failures.is_empty() {
        println!("⚠️  Tolerated failures:");
        for line in &report.tolerated_failures {
            println!("  - {}", line);
        }
    }
    println!("\n✅ Published:");
    for image in &report.pushed {
        println!("  - {}", image);
    }

    Ok(0)
}

async fn plan_command(env: HashMap<String, String>, config_file: Option<PathBuf>) -> Result<i32> {
    let config = load_config(&env, config_file, None).await?;
    let targets = RegistryTargets::from_env(&env)?;
    let plan = build_plan(&env, &config, &targets)?;

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(0)
}

async fn release_command(
    mut env: HashMap<String, String>,
    project_dir: Option<PathBuf>,
    version: Option<String>,
    skip_upload: bool,
) -> Result<i32> {
    println!("\n📦 plugin-publisher release\n");

    if let Some(dir) = project_dir {
        env.insert("CI_PROJECT_DIR".to_string(), dir.display().to_string());
    }
    if let Some(version) = version {
        env.insert("CI_COMMIT_TAG".to_string(), version);
    }

    let release_env = ReleaseEnvironment::from_env(&env)?;
    let uploader = ReleaseUploader::new(&release_env.project_dir);

    let release = uploader.prepare(&release_env.version).await?;
    let notes = uploader.save_changelog(&release).await?;
    println!("📝 Release notes written to {}", notes.display());

    if skip_upload {
        return Ok(0);
    }

    let targets = release_env.targets()?;
    if targets.is_empty() {
        println!("No release targets configured, skipping upload");
        return Ok(0);
    }

    let results = uploader.publish(&release, &targets).await?;
    println!("\n✅ Release {} uploaded", release.version);
    for result in &results {
        match &result.url {
            Some(url) => println!("  - {}: {}", result.target, url),
            None => println!("  - {}", result.target),
        }
    }

    Ok(0)
}

async fn load_descriptor(input: Option<PathBuf>) -> Result<BuildDescriptor> {
    match input {
        Some(path) => Ok(BuildDescriptor::from_yaml_file(&path).await?),
        None => Ok(BuildDescriptor::default()),
    }
}

async fn render_command(input: Option<PathBuf>, output: Option<PathBuf>) -> Result<i32> {
    let descriptor = load_descriptor(input).await?;

    let validation = descriptor.validate();
    if !validation.valid {
        for error in &validation.errors {
            eprintln!("  - [{}] {}", error.field, error.message);
        }
        return Ok(1);
    }

    let pom = descriptor.render();
    match output {
        Some(path) => {
            tokio::fs::write(&path, pom)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("✅ Wrote {}", path.display());
        }
        None => print!("{}", pom),
    }

    Ok(0)
}

async fn check_command(input: Option<PathBuf>) -> Result<i32> {
    println!("\n🔍 Descriptor Check\n");

    let descriptor = load_descriptor(input).await?;
    let result = descriptor.validate();

    if result.valid {
        println!("  ✅ Validation successful");
    } else {
        println!("  ❌ Validation failed");
        for error in &result.errors {
            println!("    - [{}] {}", error.field, error.message);
        }
    }

    if !result.warnings.is_empty() {
        println!("  ⚠️  Warnings:");
        for warning in &result.warnings {
            println!("    - [{}] {}", warning.field, warning.message);
        }
    }

    println!();
    Ok(if result.valid { 0 } else { 1 })
}
