pub mod band;
pub mod band_genre;
pub mod genre;
pub mod group;
pub mod membership;
pub mod musician;
pub mod parent;
