pub mod job_repo;
pub mod upload_repo;

pub use job_repo::JobRepo;
pub use upload_repo::UploadRepo;
