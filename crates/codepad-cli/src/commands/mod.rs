pub mod contact;
pub mod languages;
pub mod run;
