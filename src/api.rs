pub mod admin;
pub mod participant;

mod helper;
