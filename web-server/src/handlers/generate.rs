use axum::extract::{Multipart, State};
use axum::Json;
use axum_macros::debug_handler;
use tracing::{debug, info};
use ulid::Ulid;

use crate::controller::Job;
use crate::err::RequestError;
use crate::response::{JobInfo, ResponseJobInfo};
use crate::server::AppState;
use crate::spec::{GenerateApi, GenerateForm};

async fn read_form(mut multipart: Multipart) -> Result<GenerateForm, RequestError> {
    let mut form = GenerateForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image1" => form.image1 = Some(field.bytes().await?.to_vec()),
            "image2" => form.image2 = Some(field.bytes().await?.to_vec()),
            _ => {
                let value = field.text().await?;
                if !form.set_text(&name, value) {
                    debug!("ignoring unknown form field {name}");
                }
            }
        }
    }
    Ok(form)
}

#[debug_handler]
pub async fn generate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ResponseJobInfo>, RequestError> {
    let form = read_form(multipart).await?;
    let api = GenerateApi::from_form(&form, state.frontend)?;

    let id = Ulid::new();
    let work_dir = state.controller.lock().await.job_dir(id);
    let image1 = work_dir.join("image1.png");
    let image2 = work_dir.join("image2.png");
    let output = work_dir.join("output.mp4");

    let args = api.to_args(&image1, &image2, &output);
    let (frames, mode) = (api.frames, api.mode);
    let (img1, img2, dir) = (api.image1, api.image2, work_dir.clone());
    tokio::task::spawn_blocking(move || -> Result<(), inbetween::InterpError> {
        std::fs::create_dir_all(&dir)?;
        img1.save(&image1)?;
        img2.save(&image2)?;
        Ok(())
    })
    .await
    .map_err(|e| RequestError::sys(format!("could not store inputs: {e}")))??;

    let job = Job::new(id, &work_dir, &output, args);
    let mut ctx = state.controller.lock().await;
    let id = match ctx.create_job_async(job).await {
        Ok(id) => id,
        Err(e) => {
            let _ = tokio::fs::remove_dir_all(&work_dir).await;
            return Err(e.into());
        }
    };
    info!("queued {} job {id} ({frames} frames, mode {mode})", state.frontend);
    let job = ctx.get_job_status(id)?;
    Ok(Json(ResponseJobInfo::ok(JobInfo::from_job(&state.base_url, &job, false))))
}
