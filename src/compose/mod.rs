pub mod canvas;
pub mod composer;
