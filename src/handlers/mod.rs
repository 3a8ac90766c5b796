// src/handlers/mod.rs

pub mod attempt;
pub mod auth;
pub mod feedback;
pub mod health;
pub mod question;
pub mod quiz;
