use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{error, info};
use shared::HealthResponse;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{AppConfig, OUTPUT_DIR_NAME};
use crate::errors::AppError;
use crate::inference::{SaveOptions, SegmentationModel};
use crate::presenter::{OUTPUT_URL, ResultPresenter, UPLOADS_URL};
use crate::storage::upload_service::{UploadError, UploadService};

/// Everything the HTTP handlers share, cloned into each worker.
#[derive(Clone)]
pub struct AppServices {
    pub uploads: UploadService,
    pub presenter: ResultPresenter,
    pub model: Arc<dyn SegmentationModel>,
    pub frontend_dir: PathBuf,
}

impl AppServices {
    pub fn new(config: &AppConfig, model: Arc<dyn SegmentationModel>) -> Self {
        Self {
            uploads: UploadService::new(config.upload_dir(), config.max_upload_bytes),
            presenter: ResultPresenter::new(SaveOptions::new(
                config.predicts_dir.clone(),
                OUTPUT_DIR_NAME,
            )),
            model,
            frontend_dir: config.frontend_dir.clone(),
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, services: &AppServices) {
    let output_dir = services.presenter.save_options().output_dir();

    cfg.app_data(web::Data::new(services.uploads.clone()))
        .app_data(web::Data::new(services.presenter.clone()))
        .app_data(web::Data::from(services.model.clone()))
        .service(web::resource("/api/segment").route(web::post().to(handle_segment)))
        .service(web::resource("/api/health").route(web::get().to(health)))
        .service(Files::new(UPLOADS_URL, services.uploads.upload_dir()))
        .service(Files::new(OUTPUT_URL, output_dir))
        .service(Files::new("/", services.frontend_dir.clone()).index_file("index.html"));
}

async fn handle_segment(
    uploads: web::Data<UploadService>,
    presenter: web::Data<ResultPresenter>,
    model: web::Data<dyn SegmentationModel>,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let limit = uploads.max_size();
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(mut field) = payload.try_next().await? {
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            if image_data.len() + data.len() > limit {
                return Err(UploadError::FileTooLarge {
                    size: image_data.len() + data.len(),
                    limit,
                }
                .into());
            }
            image_data.extend_from_slice(&data);
        }

        // the first file field wins; other form fields are ignored
        if upload.is_none() {
            if let Some(name) = file_name {
                upload = Some((name, image_data));
            }
        }
    }

    let (file_name, image_data) = upload.ok_or(AppError::MissingFile)?;
    info!("Received upload {} ({} bytes)", file_name, image_data.len());

    let service = uploads.into_inner();
    let saved = web::block(move || service.save_image(&file_name, &image_data))
        .await?
        .inspect_err(|e| error!("Failed to save upload: {}", e))?;

    let model = model.into_inner();
    let save = presenter.save_options().clone();
    let image_path = saved.path.clone();
    info!("Running segmentation ({}) on {}", model.name(), image_path.display());
    let prediction = web::block(move || model.predict(&image_path, &save))
        .await?
        .inspect_err(|e| error!("Model inference error: {}", e))?;

    let response = presenter.present(&saved, &prediction)?;
    info!(
        "Segmented {}: {} instance(s), labels [{}]",
        saved.file_name,
        prediction.instance_count(),
        response.summary
    );
    Ok(HttpResponse::Ok().json(response))
}

async fn health(model: web::Data<dyn SegmentationModel>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        model: model.name().to_string(),
    })
}
