//! This crate aggregates household bin-collection schedules from Kent council
//! websites and republishes them as a subscribable iCalendar feed.
//! It also backs a CLI to fetch a single iCalendar file.
//!
//! Each council publishes its collection days behind a different obstacle
//! course: Tunbridge Wells requires a session-authenticated JSON API call,
//! Tonbridge & Malling a replayed multipart form POST, and Maidstone a
//! scripted headless-browser walk through its address form.

pub mod adapter;
pub mod browser;
pub mod cache;
pub mod error;
pub mod feed;
pub mod normalize;
pub mod schedule;
pub mod service;
