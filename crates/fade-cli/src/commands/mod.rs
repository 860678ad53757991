pub mod generate;
pub mod info;
pub mod run;
