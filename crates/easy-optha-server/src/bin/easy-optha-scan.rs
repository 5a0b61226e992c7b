use anyhow::Context;
use clap::Parser;
use easy_optha_core::{
    history::HistoryRecorder,
    inference::{CallOptions, InferenceService},
    models::Modality,
    workflow::WorkflowController,
};
use easy_optha_inference::{HttpHistoryClient, RemoteInferenceClient};
use easy_optha_server::{
    cli::ScanArgs,
    log,
    scan::{load_images, run_scan, ScanPlan},
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ScanArgs::parse();

    let config = args.config.load().context("Configuration error")?;
    log::init(&config.log);

    let mut options = CallOptions::default();
    if let Some(cookie) = &args.cookie {
        options = options.with_session_cookie(cookie.clone());
    }
    if let Some(timeout) = config.inference.timeout() {
        options = options.with_timeout(timeout);
    }

    let plan = ScanPlan {
        patient_id: args.patient_id.clone(),
        fundus: load_images(&args.fundus, Modality::FundusPhoto).await?,
        oct: load_images(&args.oct, Modality::Oct).await?,
    };

    let fundus = RemoteInferenceClient::new(&config.inference.fundus_url)
        .context("Invalid fundus inference URL")?;
    let oct = RemoteInferenceClient::new(&config.inference.oct_url)
        .context("Invalid OCT inference URL")?;
    let controller = WorkflowController::new(fundus, oct).with_options(options.clone());

    if args.record {
        let recorder = HttpHistoryClient::new(&config.inference.history_url)
            .context("Invalid history service URL")?
            .with_options(options);
        info!(history = %config.inference.history_url, "Recording diagnoses");
        run(controller.with_recorder(recorder), plan).await
    } else {
        run(controller, plan).await
    }
}

async fn run<I, R>(mut controller: WorkflowController<I, R>, plan: ScanPlan) -> anyhow::Result<()>
where
    I: InferenceService,
    R: HistoryRecorder,
{
    let report = run_scan(&mut controller, plan).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
