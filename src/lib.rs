pub mod adb;
pub mod api;
pub mod collector;
pub mod config;
pub mod db;
pub mod gauges;
