pub mod keywords;
pub mod nps;
pub mod sentiment;
