use std::{process, sync::Arc};

use anteprima::{
    application::{
        error::AppError,
        render::{ComrakRenderService, RenderPipelineConfig, RenderService},
    },
    config,
    domain::{
        assets::ProvisionStatus,
        document::{DocumentSnapshot, Revision},
    },
    infra::{error::InfraError, provisioner::AssetProvisioner, telemetry},
    presentation::page::{WELCOME_DOCUMENT, standalone_page},
};
use tokio::fs;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| InfraError::configuration(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Render(config::RenderCommandArgs::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Render(args) => run_render(settings, args).await,
        config::Command::Provision(_) => run_provision(settings).await,
    }
}

async fn run_provision(settings: config::Settings) -> Result<(), AppError> {
    let provisioner = AssetProvisioner::with_http_client();
    let report = provisioner
        .provision(&settings.assets.manifest, &settings.assets.root)
        .await;

    for result in report.results() {
        match &result.status {
            ProvisionStatus::AlreadyPresent => info!(
                target = "anteprima::provision",
                asset = result.descriptor.name(),
                "Already present"
            ),
            ProvisionStatus::Fetched { size_bytes, .. } => info!(
                target = "anteprima::provision",
                asset = result.descriptor.name(),
                size_bytes,
                "Fetched"
            ),
            ProvisionStatus::FetchFailed { reason } => warn!(
                target = "anteprima::provision",
                asset = result.descriptor.name(),
                reason = %reason,
                "Fetch failed"
            ),
        }
    }

    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AppError::unexpected(format!("failed to encode report: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn run_render(
    settings: config::Settings,
    args: config::RenderCommandArgs,
) -> Result<(), AppError> {
    let (text, title) = match args.file.as_ref() {
        Some(path) => {
            let text = fs::read_to_string(path).await.map_err(InfraError::Io)?;
            let title = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Markdown preview".to_string());
            (text, title)
        }
        None => (
            WELCOME_DOCUMENT.to_string(),
            "Markdown & LaTeX Live Editor".to_string(),
        ),
    };

    let provisioner = AssetProvisioner::with_http_client();
    let report = if args.no_provision {
        provisioner
            .inspect(&settings.assets.manifest, &settings.assets.root)
            .await
    } else {
        provisioner
            .provision(&settings.assets.manifest, &settings.assets.root)
            .await
    };

    for failure in report.failures() {
        warn!(
            target = "anteprima::render",
            asset = failure.descriptor.name(),
            "Asset unavailable; the dependent render stage will be skipped"
        );
    }

    let service = Arc::new(ComrakRenderService::new(RenderPipelineConfig {
        hard_breaks: settings.render.hard_breaks,
        availability: report.stage_availability(),
    }));
    let snapshot = DocumentSnapshot::new(text, Revision::new(1));
    let result = tokio::task::spawn_blocking(move || service.render(&snapshot))
        .await
        .map_err(|err| AppError::unexpected(format!("render task failed: {err}")))?;

    for warning in &result.warnings {
        warn!(target = "anteprima::render", warning = %warning, "Render warning");
    }

    let output = if args.standalone {
        standalone_page(
            &title,
            &result,
            &settings.assets.manifest,
            settings.assets.root.to_string_lossy().as_ref(),
        )
    } else {
        result.html_fragment.clone()
    };

    match args.output {
        Some(path) => {
            fs::write(&path, output).await.map_err(InfraError::Io)?;
            info!(
                target = "anteprima::render",
                path = %path.display(),
                "Wrote rendered output"
            );
        }
        None => println!("{output}"),
    }

    Ok(())
}
