pub mod data;
pub mod dates;
pub mod normalizer;
pub mod odds_format;
pub mod team_names;
