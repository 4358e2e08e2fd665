pub mod core;
pub mod matching;
pub mod monitoring;
pub mod scanner;
