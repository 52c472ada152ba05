mod admin;
mod files;

pub use admin::health;
pub use files::{delete_file, upload_file, DeleteError, UploadError};
