//! Text scanners used around the pipeline: asset references in filing HTML and
//! embedded images in recognized Markdown.

pub mod assets;
pub mod images;
