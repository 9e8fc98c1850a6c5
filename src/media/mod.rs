pub mod ffmpeg;
pub mod frame;
pub mod mimetype;
