//! One panel session: submit, follow progress, save, optionally repair.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use image::GenericImageView;

use atelier_client::api::PanelApi;
use atelier_client::backend::UploadFile;
use atelier_client::config::PanelConfig;
use atelier_client::controller::{ControllerConfig, JobController};
use atelier_client::progress::ProgressTracker;
use atelier_client::push::PushChannel;
use atelier_core::mask::{ImageGeometry, MaskEditor};
use atelier_core::types::SessionId;
use atelier_core::visibility::FieldVisibility;

use crate::args::{CliArgs, DisplaySize, Stroke};

/// Run one session against the configured backend.
pub async fn run(args: CliArgs, config: PanelConfig) -> anyhow::Result<()> {
    let selection = args.selection();
    let fields = selection.visibility();

    if args.show_fields {
        println!("{}", describe_fields(&args, &fields)?);
        return Ok(());
    }

    let file = match (&args.file, fields.upload) {
        (Some(path), true) => Some(read_upload(path).await?),
        (Some(path), false) => {
            tracing::warn!(
                file = %path.display(),
                mode = %selection.mode,
                "Mode takes no upload, ignoring file",
            );
            None
        }
        (None, _) => None,
    };

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("building HTTP client")?;
    let api = Arc::new(PanelApi::with_client(http, &config.base_url));

    match api.health().await {
        Ok(health) => tracing::info!(
            base_url = %config.base_url,
            status = %health.status,
            server = ?health.server,
            "Panel backend reachable",
        ),
        Err(e) => tracing::warn!(base_url = %config.base_url, error = %e, "Health check failed"),
    }

    let session = SessionId::generate();
    let controller = JobController::new(
        Arc::clone(&api),
        session.clone(),
        ControllerConfig::from(&config),
    );

    let push = PushChannel::new(&config.ws_url, &session);
    push.connect(controller.progress()).await;
    let progress_log = tokio::spawn(log_progress(controller.progress()));

    let outcome = run_jobs(&args, &api, &controller, file.as_ref()).await;

    push.shutdown();
    progress_log.abort();
    outcome
}

async fn run_jobs(
    args: &CliArgs,
    api: &PanelApi,
    controller: &JobController<PanelApi>,
    file: Option<&UploadFile>,
) -> anyhow::Result<()> {
    let result = controller
        .generate(args.mode, args.gen_type, &args.form(), file)
        .await?;
    tracing::info!(url = %result.url, prompt_id = %result.prompt_id, "Result ready");

    if args.output.is_none() && args.strokes.is_empty() {
        return Ok(());
    }

    let bytes = api
        .fetch_image(&result.url)
        .await
        .context("downloading result image")?;
    if let Some(output) = &args.output {
        save(output, &bytes).await?;
    }

    if args.strokes.is_empty() {
        return Ok(());
    }

    let natural = image::load_from_memory(&bytes)
        .context("decoding result image")?
        .dimensions();
    controller.arm_mask(geometry_for(natural, args.display_size))?;
    let drawn = controller.with_mask(|editor| replay_strokes(editor, &args.strokes));
    tracing::info!(strokes = drawn, width = natural.0, height = natural.1, "Mask drawn");

    let repaired = controller.apply_mask(&args.repair_prompt).await?;
    tracing::info!(url = %repaired.url, prompt_id = %repaired.prompt_id, "Repair ready");

    if let Some(output) = &args.repair_output {
        let bytes = api
            .fetch_image(&repaired.url)
            .await
            .context("downloading repaired image")?;
        save(output, &bytes).await?;
    }
    Ok(())
}

/// Mask geometry for a result of `natural` size shown at `display`.
pub fn geometry_for(natural: (u32, u32), display: Option<DisplaySize>) -> ImageGeometry {
    match display {
        Some(size) => ImageGeometry {
            natural_width: natural.0,
            natural_height: natural.1,
            display_width: size.width,
            display_height: size.height,
        },
        None => ImageGeometry::unscaled(natural.0, natural.1),
    }
}

/// Feed strokes to an armed editor as press/move/release sequences.
///
/// Returns how many strokes were drawn.
pub fn replay_strokes(editor: &mut MaskEditor, strokes: &[Stroke]) -> usize {
    let mut drawn = 0;
    for Stroke(points) in strokes {
        let Some((first, rest)) = points.split_first() else {
            continue;
        };
        if editor.pointer_down(*first).is_none() {
            continue;
        }
        for point in rest {
            editor.pointer_move(*point);
        }
        editor.pointer_up();
        drawn += 1;
    }
    drawn
}

/// JSON description of the form fields for the selected mode.
pub fn describe_fields(args: &CliArgs, fields: &FieldVisibility) -> anyhow::Result<String> {
    let value = serde_json::json!({
        "mode": args.mode.as_str(),
        "gen_type": args.gen_type,
        "fields": fields,
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

async fn read_upload(path: &Path) -> anyhow::Result<UploadFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(UploadFile::new(file_name, bytes))
}

async fn save(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "Saved image");
    Ok(())
}

/// Log visible progress changes until aborted.
async fn log_progress(tracker: Arc<ProgressTracker>) {
    let mut rx = tracker.subscribe();
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        if state.visible {
            tracing::info!(
                percent = state.fill_percent().round() as u32,
                desc = %state.description,
                "Progress",
            );
        }
    }
}
