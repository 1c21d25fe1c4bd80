pub mod draftkings;
pub mod nascar;
pub mod vegas_insider;
