pub mod capture;
pub mod matcher;
pub mod template_cache;
pub mod templates;
pub mod traits;
pub mod types;
pub mod yolo_detector;
