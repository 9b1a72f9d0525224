#![allow(async_fn_in_trait)]
pub mod cli;
pub mod composite;
mod download;
pub mod earthengine;
pub mod error;
pub mod logger;
pub mod region;
pub mod service;
pub mod settings;
