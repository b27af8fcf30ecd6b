pub mod matching;
pub mod money;
