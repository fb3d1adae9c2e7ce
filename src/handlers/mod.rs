pub mod admin;
pub mod auth;
pub mod booking;
pub mod calendar;
pub mod health;
