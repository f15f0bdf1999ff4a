#![allow(dead_code)]

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;

use vietio::api::AppState;
use vietio::config::AppConfig;
use vietio::database::{self, DbPool};
use vietio::media::UploadedImage;
use vietio::models::ad::{AdFields, AdForm};
use vietio::models::file::FileRecord;
use vietio::repositories::{files, users};
use vietio::services::AdService;
use vietio::storage::{ImageStorage, LocalStorage, StorageSet};
use vietio::utils::jwt::JwtService;

pub const SECRET: &str = "integration-secret";

pub struct TestApp {
    pub service: AdService,
    pub db: DbPool,
    pub upload_dir: PathBuf,
    pub dir: TempDir,
}

pub async fn setup() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("vietio.db").display());
    let db = database::create_pool(&url).await.unwrap();

    let upload_dir = dir.path().join("uploads");
    let local: Arc<dyn ImageStorage> =
        Arc::new(LocalStorage::new(&upload_dir, "/uploads").await.unwrap());

    TestApp {
        service: AdService::new(db.clone(), StorageSet::new(local)),
        db,
        upload_dir,
        dir,
    }
}

impl TestApp {
    pub async fn user(&self, username: &str) -> i64 {
        users::upsert_user_by_username(self.db.as_ref(), username, Utc::now())
            .await
            .unwrap()
            .id
    }

    pub async fn file_rows(&self, uuid: &str) -> Vec<FileRecord> {
        files::find_files_by_ad(self.db.as_ref(), uuid).await.unwrap()
    }

    /// Names of every stored object, ignoring the temp-file staging dir.
    pub fn stored_objects(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.upload_dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub async fn status_of(&self, uuid: &str) -> i64 {
        sqlx::query_scalar("SELECT status FROM ads WHERE uuid = ?")
            .bind(uuid)
            .fetch_one(self.db.as_ref())
            .await
            .unwrap()
    }

    pub async fn expire(&self, uuid: &str) {
        sqlx::query("UPDATE ads SET expires_at = '2000-01-01T00:00:00Z' WHERE uuid = ?")
            .bind(uuid)
            .execute(self.db.as_ref())
            .await
            .unwrap();
    }

    /// Router over this app's database and uploads, in dev mode so the
    /// login route is mounted.
    pub fn state(&self) -> Arc<AppState> {
        let env = [
            ("SECRET_KEY", SECRET.to_string()),
            ("APP_ENV", "dev".to_string()),
            ("UPLOAD_DIR", self.upload_dir.display().to_string()),
        ];
        let config = AppConfig::from_lookup(|key| {
            env.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        })
        .unwrap();

        Arc::new(AppState {
            service: self.service.clone(),
            jwt_service: Arc::new(JwtService::new(SECRET)),
            config: Arc::new(config),
        })
    }
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });

    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .unwrap();
    buf
}

pub fn upload(name: &str) -> UploadedImage {
    UploadedImage {
        file_name: name.to_string(),
        content_type: Some("image/jpeg".to_string()),
        data: jpeg_bytes(64, 48),
    }
}

pub fn fields(title: &str, price: i64, category_id: i64) -> AdFields {
    AdFields {
        title: title.to_string(),
        description: format!("{} in good condition", title),
        price,
        category_id,
    }
}

pub fn form(title: &str, images: usize) -> AdForm {
    AdForm {
        fields: fields(title, 1000, 1),
        images: (0..images).map(|i| upload(&format!("photo{}.jpg", i))).collect(),
        ..AdForm::default()
    }
}
